use lb_bootstrap_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{LiquidityError, Side, ONE};

pub const DEFAULT_DEADLINE_TTL_SECS: u64 = 600;

/// How the deadline of a time-bounded operation is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Seconds after the reference time
    Ttl(u64),
    /// Explicit unix timestamp
    At(u64),
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        DeadlinePolicy::Ttl(DEFAULT_DEADLINE_TTL_SECS)
    }
}

impl DeadlinePolicy {
    /// Concrete deadline relative to `now`; must lie strictly in the future
    pub fn resolve(&self, now: u64) -> Result<u64, LiquidityError> {
        let deadline = match *self {
            DeadlinePolicy::Ttl(secs) => now.saturating_add(secs),
            DeadlinePolicy::At(at) => at,
        };

        if deadline <= now {
            return Err(LiquidityError::DeadlineInPast { deadline, now });
        }
        Ok(deadline)
    }
}

/// Raw inputs for [`LiquidityShape::build`]
#[derive(Debug, Clone)]
pub struct ShapeParams {
    pub token_x: Address,
    pub token_y: Address,
    pub bin_step: u16,
    pub amount_x: U256,
    pub amount_y: U256,
    pub amount_x_min: U256,
    pub amount_y_min: U256,
    pub active_id_desired: u32,
    pub id_slippage: u32,
    pub delta_ids: Vec<i64>,
    pub distribution_x: Vec<u128>,
    pub distribution_y: Vec<u128>,
    pub recipient: Address,
    pub refund_recipient: Address,
    pub deadline: DeadlinePolicy,
}

/// A validated liquidity seeding request.
///
/// Invariants held by every value of this type:
/// - `delta_ids`, `distribution_x` and `distribution_y` have the same, non-zero length
/// - `delta_ids` is strictly increasing
/// - every distribution value is at most [`ONE`] and each side sums to at most [`ONE`]
/// - the deadline was in the future when the shape was built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityShape {
    token_x: Address,
    token_y: Address,
    bin_step: u16,
    amount_x: U256,
    amount_y: U256,
    amount_x_min: U256,
    amount_y_min: U256,
    active_id_desired: u32,
    id_slippage: u32,
    delta_ids: Vec<i64>,
    distribution_x: Vec<u128>,
    distribution_y: Vec<u128>,
    recipient: Address,
    refund_recipient: Address,
    deadline: u64,
}

impl LiquidityShape {
    pub fn build(params: ShapeParams, now: u64) -> Result<Self, LiquidityError> {
        if params.token_x == params.token_y {
            return Err(LiquidityError::IdenticalTokens);
        }

        check_lengths(&params.delta_ids, &params.distribution_x, &params.distribution_y)?;
        if params.delta_ids.is_empty() {
            return Err(LiquidityError::EmptyDistribution);
        }

        if let Some(index) = params
            .delta_ids
            .windows(2)
            .position(|pair| pair[0] >= pair[1])
        {
            return Err(LiquidityError::DeltaIdsNotIncreasing { index: index + 1 });
        }

        check_side(Side::X, &params.distribution_x)?;
        check_side(Side::Y, &params.distribution_y)?;

        if params.amount_x_min > params.amount_x {
            return Err(LiquidityError::InvalidAmounts(format!(
                "amountXMin {} exceeds amountX {}",
                params.amount_x_min, params.amount_x
            )));
        }
        if params.amount_y_min > params.amount_y {
            return Err(LiquidityError::InvalidAmounts(format!(
                "amountYMin {} exceeds amountY {}",
                params.amount_y_min, params.amount_y
            )));
        }
        if params.amount_x.is_zero() && params.amount_y.is_zero() {
            return Err(LiquidityError::InvalidAmounts(
                "both amounts are zero".to_string(),
            ));
        }

        let deadline = params.deadline.resolve(now)?;

        Ok(Self {
            token_x: params.token_x,
            token_y: params.token_y,
            bin_step: params.bin_step,
            amount_x: params.amount_x,
            amount_y: params.amount_y,
            amount_x_min: params.amount_x_min,
            amount_y_min: params.amount_y_min,
            active_id_desired: params.active_id_desired,
            id_slippage: params.id_slippage,
            delta_ids: params.delta_ids,
            distribution_x: params.distribution_x,
            distribution_y: params.distribution_y,
            recipient: params.recipient,
            refund_recipient: params.refund_recipient,
            deadline,
        })
    }

    pub fn token_x(&self) -> Address {
        self.token_x
    }

    pub fn token_y(&self) -> Address {
        self.token_y
    }

    pub fn bin_step(&self) -> u16 {
        self.bin_step
    }

    pub fn amount_x(&self) -> U256 {
        self.amount_x
    }

    pub fn amount_y(&self) -> U256 {
        self.amount_y
    }

    pub fn amount_x_min(&self) -> U256 {
        self.amount_x_min
    }

    pub fn amount_y_min(&self) -> U256 {
        self.amount_y_min
    }

    pub fn active_id_desired(&self) -> u32 {
        self.active_id_desired
    }

    pub fn id_slippage(&self) -> u32 {
        self.id_slippage
    }

    pub fn delta_ids(&self) -> &[i64] {
        &self.delta_ids
    }

    pub fn distribution_x(&self) -> &[u128] {
        &self.distribution_x
    }

    pub fn distribution_y(&self) -> &[u128] {
        &self.distribution_y
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn refund_recipient(&self) -> Address {
        self.refund_recipient
    }

    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn bin_count(&self) -> usize {
        self.delta_ids.len()
    }

    /// Absolute bin ids the shape targets, assuming the pair sits at the desired active id
    pub fn target_ids(&self) -> Vec<i64> {
        self.delta_ids
            .iter()
            .map(|delta| i64::from(self.active_id_desired) + delta)
            .collect()
    }
}

fn check_lengths(delta_ids: &[i64], x: &[u128], y: &[u128]) -> Result<(), LiquidityError> {
    for (name, len) in [("distributionX", x.len()), ("distributionY", y.len())] {
        if len != delta_ids.len() {
            return Err(LiquidityError::LengthMismatch {
                left: "deltaIds",
                left_len: delta_ids.len(),
                right: name,
                right_len: len,
            });
        }
    }
    Ok(())
}

fn check_side(side: Side, values: &[u128]) -> Result<(), LiquidityError> {
    let mut sum: u128 = 0;
    for (index, &value) in values.iter().enumerate() {
        if value > ONE {
            return Err(LiquidityError::DistributionValueOutOfRange { side, index, value });
        }
        sum = sum.saturating_add(value);
    }

    if sum > ONE {
        return Err(LiquidityError::DistributionOverflow { side, sum });
    }
    Ok(())
}
