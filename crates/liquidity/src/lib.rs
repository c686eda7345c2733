//! Liquidity distribution building
//!
//! Everything here is pure and validated locally before anything is
//! submitted: [`LiquidityShape`] and [`LiquidityWithdrawal`] can only be
//! obtained through their validating constructors.

pub mod bin;
pub mod curve;
pub mod error;
pub mod shape;
pub mod table;
pub mod withdrawal;

pub use bin::{id_from_price, price_from_id, REAL_ID_SHIFT};
pub use curve::{delta_ids, generate_curve, CurveProfile, CurveShape, Placement};
pub use error::*;
pub use shape::*;
pub use table::{parse_bin_distribution, DistributionTable};
pub use withdrawal::*;

/// Fixed-point unit for 100% of a side's liquidity
pub const ONE: u128 = 1_000_000_000_000_000_000;

pub const PRECISION: u128 = ONE;
