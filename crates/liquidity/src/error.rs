use std::fmt;
use thiserror::Error;

/// Token side of a liquidity distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    X,
    Y,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::X => write!(f, "distributionX"),
            Side::Y => write!(f, "distributionY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiquidityError {
    #[error("length mismatch: {left} has {left_len} entries, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("deltaIds must be strictly increasing (violated at index {index})")]
    DeltaIdsNotIncreasing { index: usize },

    #[error("{side} sums to {sum}, above the full weight unit")]
    DistributionOverflow { side: Side, sum: u128 },

    #[error("{side}[{index}] = {value} exceeds the full weight unit")]
    DistributionValueOutOfRange { side: Side, index: usize, value: u128 },

    #[error("liquidity shape has no bins")]
    EmptyDistribution,

    #[error("withdrawal has no bins")]
    NothingToWithdraw,

    #[error("deadline {deadline} is not after current time {now}")]
    DeadlineInPast { deadline: u64, now: u64 },

    #[error("invalid amounts: {0}")]
    InvalidAmounts(String),

    #[error("tokenX and tokenY are the same token")]
    IdenticalTokens,

    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    #[error("invalid distribution entry '{input}': {reason}")]
    InvalidDistributionEntry { input: String, reason: String },
}
