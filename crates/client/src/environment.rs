use async_trait::async_trait;
use lb_bootstrap_types::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CallValue, ClientError};

/// A call against a deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub to: Address,
    pub method: String,
    pub args: Vec<CallValue>,
    /// Native amount attached to the call
    #[serde(default)]
    pub value: U256,
}

impl ContractCall {
    pub fn new(to: Address, method: impl Into<String>) -> Self {
        Self {
            to,
            method: method.into(),
            args: Vec::new(),
            value: U256::ZERO,
        }
    }

    pub fn arg(mut self, arg: impl Into<CallValue>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Deployment of a compiled contract artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub artifact: String,
    pub constructor_args: Vec<CallValue>,
}

impl DeployRequest {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            constructor_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<CallValue>) -> Self {
        self.constructor_args.push(arg.into());
        self
    }
}

/// Handle for a submitted state-changing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTx {
    pub tx_hash: B256,
    /// Method or artifact name, for logging
    pub label: String,
}

impl fmt::Display for PendingTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.tx_hash)
    }
}

/// Confirmed outcome of a [`PendingTx`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: B256,
    /// Set for deployments
    pub contract_address: Option<Address>,
    /// Unix seconds of the including block
    pub block_timestamp: u64,
    /// Decoded return values of the call
    #[serde(default)]
    pub outputs: Vec<CallValue>,
}

impl Receipt {
    pub fn output(&self, index: usize) -> Result<&CallValue, ClientError> {
        self.outputs.get(index).ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "receipt {} has no output at index {index}",
                self.tx_hash
            ))
        })
    }

    pub fn deployed_address(&self) -> Result<Address, ClientError> {
        self.contract_address.ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "receipt {} carries no contract address",
                self.tx_hash
            ))
        })
    }
}

/// The external system that executes deployments and contract calls
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Account that signs every submitted operation
    fn signer(&self) -> Address;

    async fn deploy(&self, request: DeployRequest) -> Result<PendingTx, ClientError>;

    async fn submit(&self, call: ContractCall) -> Result<PendingTx, ClientError>;

    /// Read-only call; no confirmation needed
    async fn call_view(&self, call: ContractCall) -> Result<Vec<CallValue>, ClientError>;

    /// Block until the operation is included, or fail with its revert reason
    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<Receipt, ClientError>;

    async fn block_timestamp(&self) -> Result<u64, ClientError>;
}
