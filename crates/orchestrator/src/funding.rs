use lb_bootstrap_client::{CallValue, ContractCall, ExecutionEnvironment};
use lb_bootstrap_liquidity::ONE;
use lb_bootstrap_registry::AddressRegistry;
use lb_bootstrap_types::{Address, ContractName, B256, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::executor::{submit_and_confirm, ExecutionError};

/// Two million whole tokens at 18 decimals
pub fn default_mint_amount() -> U256 {
    U256::from(2_000_000u128 * ONE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingReceipt {
    pub mint_tx: B256,
    pub approve_tx: B256,
    /// Recipient balance after minting
    pub balance: U256,
}

/// Mints the mock quote asset and lets the router spend the signer's balance
pub struct TokenFunding {
    environment: Arc<dyn ExecutionEnvironment>,
    token: Address,
    spender: Address,
}

impl TokenFunding {
    pub fn new(environment: Arc<dyn ExecutionEnvironment>, token: Address, spender: Address) -> Self {
        Self {
            environment,
            token,
            spender,
        }
    }

    /// Needs `MockERC20` and `LBRouter` recorded for the network
    pub fn from_registry(
        environment: Arc<dyn ExecutionEnvironment>,
        registry: &AddressRegistry,
    ) -> Result<Self, ExecutionError> {
        let token = registry.require(ContractName::MockErc20)?;
        let spender = registry.require(ContractName::LbRouter)?;
        Ok(Self::new(environment, token, spender))
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Mint `amount` to `recipient`, then approve the router for an unlimited
    /// allowance from the signer. The approval is only sent once the mint is
    /// confirmed.
    pub async fn fund_and_approve(&self, recipient: Address, amount: U256) -> Result<FundingReceipt, ExecutionError> {
        info!(token = %self.token, recipient = %recipient, amount = %amount, "Minting tokens");
        let mint = submit_and_confirm(
            self.environment.as_ref(),
            ContractCall::new(self.token, "mint").arg(recipient).arg(amount),
        )
        .await?;

        let approve = submit_and_confirm(
            self.environment.as_ref(),
            ContractCall::new(self.token, "approve")
                .arg(self.spender)
                .arg(U256::MAX),
        )
        .await?;
        info!(token = %self.token, spender = %self.spender, tx_hash = %approve.tx_hash, "Router approved");

        let balance = self.balance_of(recipient).await?;
        Ok(FundingReceipt {
            mint_tx: mint.tx_hash,
            approve_tx: approve.tx_hash,
            balance,
        })
    }

    pub async fn balance_of(&self, holder: Address) -> Result<U256, ExecutionError> {
        let method = "balanceOf";
        let values = self
            .environment
            .call_view(ContractCall::new(self.token, method).arg(holder))
            .await
            .map_err(|source| ExecutionError::Transport {
                method: method.to_string(),
                source,
            })?;

        values
            .first()
            .and_then(CallValue::as_uint)
            .ok_or_else(|| ExecutionError::InvalidResponse {
                method: method.to_string(),
                reason: "expected an unsigned integer".to_string(),
            })
    }
}
