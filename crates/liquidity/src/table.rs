use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{LiquidityError, ONE};

/// Parse a `delta,x,y` bin entry where `x` and `y` are fractions of each side
/// (e.g. `211,0.0409,0`), converted to fixed point.
pub fn parse_bin_distribution(src: &str) -> Result<(i64, u128, u128), LiquidityError> {
    let invalid = |reason: String| LiquidityError::InvalidDistributionEntry {
        input: src.to_string(),
        reason,
    };

    let parts: Vec<&str> = src.split(',').map(str::trim).collect();
    let [delta, x, y] = parts.as_slice() else {
        return Err(invalid(format!("expected 3 fields, got {}", parts.len())));
    };

    let delta = delta
        .parse::<i64>()
        .map_err(|e| invalid(format!("delta id: {e}")))?;
    let x = fraction_to_fixed(x).map_err(|reason| invalid(format!("x: {reason}")))?;
    let y = fraction_to_fixed(y).map_err(|reason| invalid(format!("y: {reason}")))?;

    Ok((delta, x, y))
}

fn fraction_to_fixed(src: &str) -> Result<u128, String> {
    let fraction = Decimal::from_str(src).map_err(|e| e.to_string())?;
    if fraction < Decimal::ZERO || fraction > Decimal::ONE {
        return Err(format!("{fraction} is outside [0, 1]"));
    }

    let scaled = fraction
        .checked_mul(Decimal::from(ONE as u64))
        .ok_or_else(|| "too many decimal places".to_string())?;
    scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| format!("{fraction} cannot be represented"))
}

/// Explicit per-bin table, collected from parsed entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionTable {
    pub delta_ids: Vec<i64>,
    pub distribution_x: Vec<u128>,
    pub distribution_y: Vec<u128>,
}

impl DistributionTable {
    pub fn is_empty(&self) -> bool {
        self.delta_ids.is_empty()
    }
}

impl FromIterator<(i64, u128, u128)> for DistributionTable {
    fn from_iter<I: IntoIterator<Item = (i64, u128, u128)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (delta, x, y) in iter {
            table.delta_ids.push(delta);
            table.distribution_x.push(x);
            table.distribution_y.push(y);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_bin_distribution("211,0.040917156964249510,0").unwrap(),
            (211, 40_917_156_964_249_510, 0)
        );
        assert_eq!(parse_bin_distribution("-3, 0, 0.5").unwrap(), (-3, 0, ONE / 2));
        assert_eq!(parse_bin_distribution("0,1,1").unwrap(), (0, ONE, ONE));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "1,2", "1,0.5,0.5,0", "x,0,0", "1,1.5,0", "1,-0.1,0", "1,abc,0"] {
            assert!(
                matches!(
                    parse_bin_distribution(input),
                    Err(LiquidityError::InvalidDistributionEntry { .. })
                ),
                "{input:?} accepted"
            );
        }
    }

    #[test]
    fn test_collect_table() {
        let table: DistributionTable = ["-1,0,0.5", "0,0.5,0.5", "1,0.5,0"]
            .into_iter()
            .map(|entry| parse_bin_distribution(entry).unwrap())
            .collect();

        assert_eq!(table.delta_ids, vec![-1, 0, 1]);
        assert_eq!(table.distribution_x, vec![0, ONE / 2, ONE / 2]);
        assert_eq!(table.distribution_y, vec![ONE / 2, ONE / 2, 0]);
    }
}
