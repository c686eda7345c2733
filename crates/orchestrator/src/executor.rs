use lb_bootstrap_client::{CallValue, ClientError, ContractCall, ExecutionEnvironment, Receipt};
use lb_bootstrap_liquidity::{
    LiquidityError, LiquidityShape, LiquidityWithdrawal, ShapeParams, WithdrawalParams,
};
use lb_bootstrap_registry::{AddressRegistry, RegistryError};
use lb_bootstrap_types::{Address, ContractName, B256, U256};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Router revert raised when a call lands after its deadline
const DEADLINE_REVERT: &str = "DeadlineExceeded";

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Liquidity(#[from] LiquidityError),

    #[error("{method} missed its deadline {deadline}{}", observed_suffix(.observed_at))]
    DeadlineExpired {
        method: String,
        deadline: u64,
        /// Block time seen after the failure, when it could be read
        observed_at: Option<u64>,
    },

    #[error("{method} rejected: {reason}")]
    RemoteCallRejected { method: String, reason: String },

    #[error("{method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: ClientError,
    },

    #[error("{method} returned an unexpected response: {reason}")]
    InvalidResponse { method: String, reason: String },
}

fn observed_suffix(observed_at: &Option<u64>) -> String {
    observed_at
        .map(|at| format!(" (block time {at})"))
        .unwrap_or_default()
}

/// A liquidity position created by a deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPosition {
    pub id: U256,
    pub liquidity: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddLiquidityOutcome {
    pub tx_hash: B256,
    pub used_x: U256,
    pub used_y: U256,
    /// Refunded to the refund recipient
    pub left_x: U256,
    pub left_y: U256,
    pub positions: Vec<CreatedPosition>,
}

impl AddLiquidityOutcome {
    /// Decode `(amountXAdded, amountYAdded, amountXLeft, amountYLeft, depositIds, liquidityMinted)`
    fn from_receipt(receipt: &Receipt) -> Result<Self, String> {
        let uint = |index: usize| {
            receipt
                .outputs
                .get(index)
                .and_then(CallValue::as_uint)
                .ok_or_else(|| format!("output {index} is not an unsigned integer"))
        };
        let uint_array = |index: usize| {
            receipt
                .outputs
                .get(index)
                .and_then(CallValue::as_uint_array)
                .ok_or_else(|| format!("output {index} is not a list of unsigned integers"))
        };

        let deposit_ids = uint_array(4)?;
        let minted = uint_array(5)?;
        if deposit_ids.len() != minted.len() {
            return Err(format!(
                "{} deposit ids but {} minted amounts",
                deposit_ids.len(),
                minted.len()
            ));
        }

        Ok(Self {
            tx_hash: receipt.tx_hash,
            used_x: uint(0)?,
            used_y: uint(1)?,
            left_x: uint(2)?,
            left_y: uint(3)?,
            positions: deposit_ids
                .into_iter()
                .zip(minted)
                .map(|(id, liquidity)| CreatedPosition { id, liquidity })
                .collect(),
        })
    }

    pub fn total_minted(&self) -> U256 {
        self.positions
            .iter()
            .fold(U256::ZERO, |acc, position| acc.saturating_add(position.liquidity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveLiquidityOutcome {
    pub tx_hash: B256,
    pub received_token: U256,
    pub received_native: U256,
}

/// Submits validated liquidity operations to the router
pub struct LiquidityExecutor {
    environment: Arc<dyn ExecutionEnvironment>,
    router: Address,
    wrapped_native: Address,
}

impl LiquidityExecutor {
    pub fn new(environment: Arc<dyn ExecutionEnvironment>, router: Address, wrapped_native: Address) -> Self {
        Self {
            environment,
            router,
            wrapped_native,
        }
    }

    /// Needs `LBRouter` and `wIOTA` recorded for the network
    pub fn from_registry(
        environment: Arc<dyn ExecutionEnvironment>,
        registry: &AddressRegistry,
    ) -> Result<Self, ExecutionError> {
        let router = registry.require(ContractName::LbRouter)?;
        let wrapped_native = registry.require(ContractName::WIota)?;
        Ok(Self::new(environment, router, wrapped_native))
    }

    pub fn router(&self) -> Address {
        self.router
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Validate a seeding request against the current block time
    pub async fn shape(&self, params: ShapeParams) -> Result<LiquidityShape, ExecutionError> {
        let now = self.block_time("addLiquidity").await?;
        Ok(LiquidityShape::build(params, now)?)
    }

    /// Validate a removal request against the current block time
    pub async fn withdrawal(&self, params: WithdrawalParams) -> Result<LiquidityWithdrawal, ExecutionError> {
        let now = self.block_time("removeLiquidityNATIVE").await?;
        Ok(LiquidityWithdrawal::build(params, now)?)
    }

    /// Deposit `shape` through the router and wait for inclusion.
    ///
    /// When one side is the wrapped native token its amount is attached as
    /// call value and `addLiquidityNATIVE` is used.
    pub async fn add_liquidity(&self, shape: &LiquidityShape) -> Result<AddLiquidityOutcome, ExecutionError> {
        let (method, value) = if shape.token_x() == self.wrapped_native {
            ("addLiquidityNATIVE", shape.amount_x())
        } else if shape.token_y() == self.wrapped_native {
            ("addLiquidityNATIVE", shape.amount_y())
        } else {
            ("addLiquidity", U256::ZERO)
        };

        info!(
            router = %self.router,
            method,
            bins = shape.bin_count(),
            active_id = shape.active_id_desired(),
            amount_x = %shape.amount_x(),
            amount_y = %shape.amount_y(),
            deadline = shape.deadline(),
            "Adding liquidity"
        );

        let call = ContractCall::new(self.router, method)
            .arg(liquidity_parameters(shape))
            .with_value(value);
        let receipt = self.transact(call, shape.deadline()).await?;

        let outcome = AddLiquidityOutcome::from_receipt(&receipt).map_err(|reason| {
            ExecutionError::InvalidResponse {
                method: method.to_string(),
                reason,
            }
        })?;

        info!(
            tx_hash = %outcome.tx_hash,
            used_x = %outcome.used_x,
            used_y = %outcome.used_y,
            positions = outcome.positions.len(),
            "Liquidity added"
        );
        Ok(outcome)
    }

    pub async fn remove_liquidity(
        &self,
        withdrawal: &LiquidityWithdrawal,
    ) -> Result<RemoveLiquidityOutcome, ExecutionError> {
        let method = "removeLiquidityNATIVE";
        info!(
            router = %self.router,
            token = %withdrawal.token(),
            bins = withdrawal.ids().len(),
            deadline = withdrawal.deadline(),
            "Removing liquidity"
        );

        let call = ContractCall::new(self.router, method)
            .arg(withdrawal.token())
            .arg(withdrawal.bin_step())
            .arg(withdrawal.amount_token_min())
            .arg(withdrawal.amount_native_min())
            .arg(CallValue::uint_array(withdrawal.ids().iter().copied().map(U256::from)))
            .arg(CallValue::uint_array(withdrawal.amounts().iter().copied()))
            .arg(withdrawal.recipient())
            .arg(withdrawal.deadline());
        let receipt = self.transact(call, withdrawal.deadline()).await?;

        let amount = |index: usize| {
            receipt
                .outputs
                .get(index)
                .and_then(CallValue::as_uint)
                .ok_or_else(|| ExecutionError::InvalidResponse {
                    method: method.to_string(),
                    reason: format!("output {index} is not an unsigned integer"),
                })
        };
        let outcome = RemoveLiquidityOutcome {
            tx_hash: receipt.tx_hash,
            received_token: amount(0)?,
            received_native: amount(1)?,
        };

        info!(
            tx_hash = %outcome.tx_hash,
            received_token = %outcome.received_token,
            received_native = %outcome.received_native,
            "Liquidity removed"
        );
        Ok(outcome)
    }

    async fn block_time(&self, method: &str) -> Result<u64, ExecutionError> {
        self.environment
            .block_timestamp()
            .await
            .map_err(|source| ExecutionError::Transport {
                method: method.to_string(),
                source,
            })
    }

    /// Submit once and wait.
    ///
    /// A remote failure becomes [`ExecutionError::DeadlineExpired`] when the
    /// router names its deadline error or when block time has already moved
    /// past `deadline`, whatever the reported reason.
    async fn transact(&self, call: ContractCall, deadline: u64) -> Result<Receipt, ExecutionError> {
        let method = call.method.clone();
        match submit_and_confirm(self.environment.as_ref(), call).await {
            Err(ExecutionError::RemoteCallRejected { method: rejected, reason }) => {
                let observed_at = self.environment.block_timestamp().await.ok();
                let expired = reason.contains(DEADLINE_REVERT)
                    || observed_at.is_some_and(|at| at > deadline);
                if !expired {
                    return Err(ExecutionError::RemoteCallRejected {
                        method: rejected,
                        reason,
                    });
                }

                warn!(method = %method, deadline, observed_at = ?observed_at, reason = %reason, "Deadline passed before inclusion");
                Err(ExecutionError::DeadlineExpired {
                    method,
                    deadline,
                    observed_at,
                })
            }
            other => other,
        }
    }
}

/// Submit `call` and wait for its receipt, classifying remote failures
pub(crate) async fn submit_and_confirm(
    environment: &dyn ExecutionEnvironment,
    call: ContractCall,
) -> Result<Receipt, ExecutionError> {
    let method = call.method.clone();
    let classify = |err: ClientError| {
        if err.is_remote_failure() {
            ExecutionError::RemoteCallRejected {
                method: method.clone(),
                reason: err.reason(),
            }
        } else {
            ExecutionError::Transport {
                method: method.clone(),
                source: err,
            }
        }
    };

    let pending = environment.submit(call).await.map_err(classify)?;
    environment
        .wait_for_confirmation(&pending)
        .await
        .map_err(classify)
}

/// The router's `LiquidityParameters` struct, in field order
fn liquidity_parameters(shape: &LiquidityShape) -> CallValue {
    CallValue::Tuple(vec![
        shape.token_x().into(),
        shape.token_y().into(),
        shape.bin_step().into(),
        shape.amount_x().into(),
        shape.amount_y().into(),
        shape.amount_x_min().into(),
        shape.amount_y_min().into(),
        shape.active_id_desired().into(),
        shape.id_slippage().into(),
        CallValue::int_array(shape.delta_ids().iter().copied()),
        CallValue::uint_array(shape.distribution_x().iter().copied().map(U256::from)),
        CallValue::uint_array(shape.distribution_y().iter().copied().map(U256::from)),
        shape.recipient().into(),
        shape.refund_recipient().into(),
        shape.deadline().into(),
    ])
}
