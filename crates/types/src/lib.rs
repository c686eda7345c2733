pub mod contract;
pub mod network;
pub mod preset;

pub use contract::*;
pub use network::*;
pub use preset::*;

pub use alloy_primitives::{Address, B256, I256, U256};

/// Placeholder used for router/quoter dependency slots this deployment leaves unused.
pub const NULL_ADDRESS: Address = Address::ZERO;
