//! Provisioning pipeline and liquidity operations for a Liquidity Book deployment

pub mod executor;
pub mod funding;
pub mod provisioner;
pub mod steps;


// Re-export main types
pub use executor::{
    AddLiquidityOutcome, CreatedPosition, ExecutionError, LiquidityExecutor, RemoveLiquidityOutcome,
};
pub use funding::{default_mint_amount, FundingReceipt, TokenFunding};
pub use provisioner::{
    BuilderError, MockTokenSpec, Provisioner, ProvisionerBuilder, ProvisioningError,
    ProvisioningPlan, ProvisioningReport, RedeployPolicy, RunId, StepOutcome, StepRecord,
    DEFAULT_ACTIVE_ID, DEFAULT_BIN_STEP, DEFAULT_FLASH_LOAN_FEE,
};
pub use steps::ProvisioningStep;
