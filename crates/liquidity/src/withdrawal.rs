use lb_bootstrap_types::{Address, U256};

use crate::{DeadlinePolicy, LiquidityError};

/// Raw inputs for [`LiquidityWithdrawal::build`]
#[derive(Debug, Clone)]
pub struct WithdrawalParams {
    /// Non-native token received alongside the native asset
    pub token: Address,
    pub bin_step: u16,
    pub amount_token_min: U256,
    pub amount_native_min: U256,
    pub ids: Vec<u32>,
    pub amounts: Vec<U256>,
    pub recipient: Address,
    pub deadline: DeadlinePolicy,
}

/// A validated liquidity removal request.
///
/// Whether the caller actually holds the positions is checked by the router, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityWithdrawal {
    token: Address,
    bin_step: u16,
    amount_token_min: U256,
    amount_native_min: U256,
    ids: Vec<u32>,
    amounts: Vec<U256>,
    recipient: Address,
    deadline: u64,
}

impl LiquidityWithdrawal {
    pub fn build(params: WithdrawalParams, now: u64) -> Result<Self, LiquidityError> {
        if params.ids.len() != params.amounts.len() {
            return Err(LiquidityError::LengthMismatch {
                left: "ids",
                left_len: params.ids.len(),
                right: "amounts",
                right_len: params.amounts.len(),
            });
        }
        if params.ids.is_empty() {
            return Err(LiquidityError::NothingToWithdraw);
        }

        let deadline = params.deadline.resolve(now)?;

        Ok(Self {
            token: params.token,
            bin_step: params.bin_step,
            amount_token_min: params.amount_token_min,
            amount_native_min: params.amount_native_min,
            ids: params.ids,
            amounts: params.amounts,
            recipient: params.recipient,
            deadline,
        })
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn bin_step(&self) -> u16 {
        self.bin_step
    }

    pub fn amount_token_min(&self) -> U256 {
        self.amount_token_min
    }

    pub fn amount_native_min(&self) -> U256 {
        self.amount_native_min
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn amounts(&self) -> &[U256] {
        &self.amounts
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn deadline(&self) -> u64 {
        self.deadline
    }
}
