use async_trait::async_trait;
use lb_bootstrap_types::{Address, B256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    CallValue, ClientError, ContractCall, DeployRequest, ExecutionEnvironment, ExponentialBackoff,
    PendingTx, Receipt,
};

/// Positional params for argument-less methods
const NO_PARAMS: [u8; 0] = [];

/// Connection settings for a signing deployment gateway
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Signer to report; queried from the gateway when unset
    pub signer: Option<Address>,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    /// No limit when unset
    pub confirmation_timeout: Option<Duration>,
    pub request_timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            signer: None,
            poll_interval: Duration::from_millis(500),
            max_poll_interval: Duration::from_secs(8),
            confirmation_timeout: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC 2.0 client for a deployment gateway.
///
/// The gateway holds the signing key and exposes `lb_*` methods; this client
/// never sees credential material.
pub struct RpcEnvironment {
    config: RpcConfig,
    signer: Address,
    client: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    tx_hash: B256,
    status: bool,
    contract_address: Option<Address>,
    block_timestamp: u64,
    #[serde(default)]
    outputs: Vec<CallValue>,
    revert_reason: Option<String>,
}

impl RpcEnvironment {
    /// Connect to the gateway, resolving the signer if not configured
    pub async fn connect(config: RpcConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let mut env = Self {
            signer: config.signer.unwrap_or(Address::ZERO),
            config,
            client,
            next_id: AtomicU64::new(1),
        };

        if env.config.signer.is_none() {
            env.signer = env.request("lb_signer", NO_PARAMS).await?;
        }

        debug!(url = %env.config.url, signer = %env.signer, "Connected to deployment gateway");
        Ok(env)
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Connection(format!("{method}: {e}")))?;

        if !response.status().is_success() {
            return Err(ClientError::Connection(format!(
                "{method}: gateway returned HTTP {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = body.error {
            return Err(ClientError::Rejected {
                method: method.to_string(),
                reason: format!("{} (code {})", error.message, error.code),
            });
        }

        serde_json::from_value(body.result)
            .map_err(|e| ClientError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl ExecutionEnvironment for RpcEnvironment {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn deploy(&self, request: DeployRequest) -> Result<PendingTx, ClientError> {
        let tx_hash: B256 = self.request("lb_deploy", [&request]).await?;
        debug!(artifact = %request.artifact, tx_hash = %tx_hash, "Deployment submitted");
        Ok(PendingTx {
            tx_hash,
            label: request.artifact,
        })
    }

    async fn submit(&self, call: ContractCall) -> Result<PendingTx, ClientError> {
        let tx_hash: B256 = self.request("lb_sendTransaction", [&call]).await?;
        debug!(method = %call.method, to = %call.to, tx_hash = %tx_hash, "Transaction submitted");
        Ok(PendingTx {
            tx_hash,
            label: call.method,
        })
    }

    async fn call_view(&self, call: ContractCall) -> Result<Vec<CallValue>, ClientError> {
        self.request("lb_call", [&call]).await
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<Receipt, ClientError> {
        let mut backoff =
            ExponentialBackoff::new(self.config.poll_interval, self.config.max_poll_interval);

        loop {
            // Transport failures are retried here; the transaction is never resubmitted
            let receipt = match self
                .request::<_, Option<ReceiptResponse>>("lb_getTransactionReceipt", [tx.tx_hash])
                .await
            {
                Ok(receipt) => receipt,
                Err(ClientError::Connection(reason)) => {
                    warn!(tx = %tx, attempt = backoff.attempt(), reason = %reason, "Receipt poll failed, retrying");
                    None
                }
                Err(err) => return Err(err),
            };

            if let Some(receipt) = receipt {
                if !receipt.status {
                    let reason = receipt
                        .revert_reason
                        .unwrap_or_else(|| "execution reverted".to_string());
                    warn!(tx = %tx, reason = %reason, "Transaction reverted");
                    return Err(ClientError::Reverted {
                        tx_hash: receipt.tx_hash.to_string(),
                        reason,
                    });
                }

                return Ok(Receipt {
                    tx_hash: receipt.tx_hash,
                    contract_address: receipt.contract_address,
                    block_timestamp: receipt.block_timestamp,
                    outputs: receipt.outputs,
                });
            }

            if let Some(limit) = self.config.confirmation_timeout {
                if backoff.total_waited() >= limit {
                    return Err(ClientError::ConfirmationTimeout {
                        tx_hash: tx.tx_hash.to_string(),
                        waited_secs: backoff.total_waited().as_secs(),
                    });
                }
            }

            let delay = backoff.next_delay();
            debug!(tx = %tx, attempt = backoff.attempt(), delay_ms = delay.as_millis() as u64, "Awaiting confirmation");
            tokio::time::sleep(delay).await;
        }
    }

    async fn block_timestamp(&self) -> Result<u64, ClientError> {
        self.request("lb_blockTimestamp", NO_PARAMS).await
    }
}
