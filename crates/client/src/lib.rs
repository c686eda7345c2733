//! Access to the external execution environment
//!
//! Every contract deployment and call goes through [`ExecutionEnvironment`].
//! Mutating operations return a [`PendingTx`] that callers must confirm with
//! [`ExecutionEnvironment::wait_for_confirmation`] before trusting the result.

pub mod backoff;
pub mod environment;
pub mod error;
pub mod rpc;
pub mod simulated;
pub mod value;

pub use backoff::ExponentialBackoff;
pub use environment::*;
pub use error::*;
pub use rpc::{RpcConfig, RpcEnvironment};
pub use simulated::{DeployRecord, FailureMode, SimulatedEnvironment};
pub use value::CallValue;
