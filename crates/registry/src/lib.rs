//! Address registry for provisioned contracts
//!
//! One registry exists per target network. Entries are append-only during a
//! run: an address already recorded is authoritative and is only replaced
//! through an explicit [`AddressRegistry::reset`].

pub mod error;
pub mod registry;
pub mod store;

pub use error::*;
pub use registry::*;
pub use store::*;
