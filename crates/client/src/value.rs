use lb_bootstrap_types::{Address, I256, U256};
use serde::{Deserialize, Serialize};

/// ABI-level argument or return value exchanged with the execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallValue {
    Address(Address),
    Uint(U256),
    Int(I256),
    Bool(bool),
    String(String),
    Array(Vec<CallValue>),
    Tuple(Vec<CallValue>),
}

impl CallValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            CallValue::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            CallValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            CallValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CallValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Elements of an array or tuple
    pub fn as_array(&self) -> Option<&[CallValue]> {
        match self {
            CallValue::Array(items) | CallValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Array of unsigned integers, e.g. `uint256[]` return values
    pub fn as_uint_array(&self) -> Option<Vec<U256>> {
        self.as_array()?.iter().map(CallValue::as_uint).collect()
    }

    pub fn uint_array<T: Into<U256>>(values: impl IntoIterator<Item = T>) -> Self {
        CallValue::Array(values.into_iter().map(|v| CallValue::Uint(v.into())).collect())
    }

    pub fn int_array(values: impl IntoIterator<Item = i64>) -> Self {
        CallValue::Array(values.into_iter().map(CallValue::from).collect())
    }
}

impl From<Address> for CallValue {
    fn from(value: Address) -> Self {
        CallValue::Address(value)
    }
}

impl From<U256> for CallValue {
    fn from(value: U256) -> Self {
        CallValue::Uint(value)
    }
}

impl From<u64> for CallValue {
    fn from(value: u64) -> Self {
        CallValue::Uint(U256::from(value))
    }
}

impl From<u128> for CallValue {
    fn from(value: u128) -> Self {
        CallValue::Uint(U256::from(value))
    }
}

impl From<u16> for CallValue {
    fn from(value: u16) -> Self {
        CallValue::Uint(U256::from(value))
    }
}

impl From<u32> for CallValue {
    fn from(value: u32) -> Self {
        CallValue::Uint(U256::from(value))
    }
}

/// Two's complement widening of a signed 64-bit value
impl From<i64> for CallValue {
    fn from(value: i64) -> Self {
        let magnitude = U256::from(value.unsigned_abs());
        let raw = if value < 0 {
            U256::ZERO.wrapping_sub(magnitude)
        } else {
            magnitude
        };
        CallValue::Int(I256::from_raw(raw))
    }
}

impl From<bool> for CallValue {
    fn from(value: bool) -> Self {
        CallValue::Bool(value)
    }
}

impl From<&str> for CallValue {
    fn from(value: &str) -> Self {
        CallValue::String(value.to_string())
    }
}

impl From<String> for CallValue {
    fn from(value: String) -> Self {
        CallValue::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_ints_are_twos_complement() {
        let value = CallValue::from(-3i64);
        let int = value.as_int().unwrap();
        assert!(int.is_negative());
        assert_eq!(int + I256::from_raw(U256::from(3u64)), I256::ZERO);
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let value = CallValue::from(true);
        assert_eq!(value.as_bool(), Some(true));
        assert_eq!(value.as_uint(), None);
        assert_eq!(value.as_address(), None);
        assert!(value.as_array().is_none());
    }

    #[test]
    fn test_uint_array() {
        let value = CallValue::uint_array([1u64, 2, 3].map(U256::from));
        assert_eq!(
            value.as_uint_array(),
            Some(vec![U256::from(1u64), U256::from(2u64), U256::from(3u64)])
        );

        let mixed = CallValue::Array(vec![CallValue::from(1u64), CallValue::from(false)]);
        assert_eq!(mixed.as_uint_array(), None);
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let json = serde_json::to_value(CallValue::from(Address::ZERO)).unwrap();
        assert_eq!(json["type"], "address");
        assert!(json["value"].is_string());
    }
}
