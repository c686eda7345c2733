use lb_bootstrap_types::ContractName;
use serde::Serialize;
use std::fmt;

/// The fixed provisioning pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    DeployWrappedNative,
    DeployMockToken,
    DeployFactory,
    DeployPairImplementation,
    DeployRouter,
    DeployQuoter,
    SetPairImplementation,
    RegisterPresets,
    WhitelistQuoteAsset,
    CreatePair,
}

impl ProvisioningStep {
    pub const ALL: [ProvisioningStep; 10] = [
        ProvisioningStep::DeployWrappedNative,
        ProvisioningStep::DeployMockToken,
        ProvisioningStep::DeployFactory,
        ProvisioningStep::DeployPairImplementation,
        ProvisioningStep::DeployRouter,
        ProvisioningStep::DeployQuoter,
        ProvisioningStep::SetPairImplementation,
        ProvisioningStep::RegisterPresets,
        ProvisioningStep::WhitelistQuoteAsset,
        ProvisioningStep::CreatePair,
    ];

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProvisioningStep::DeployWrappedNative => "deploy_wrapped_native",
            ProvisioningStep::DeployMockToken => "deploy_mock_token",
            ProvisioningStep::DeployFactory => "deploy_factory",
            ProvisioningStep::DeployPairImplementation => "deploy_pair_implementation",
            ProvisioningStep::DeployRouter => "deploy_router",
            ProvisioningStep::DeployQuoter => "deploy_quoter",
            ProvisioningStep::SetPairImplementation => "set_pair_implementation",
            ProvisioningStep::RegisterPresets => "register_presets",
            ProvisioningStep::WhitelistQuoteAsset => "whitelist_quote_asset",
            ProvisioningStep::CreatePair => "create_pair",
        }
    }

    /// Registry entries that must exist before the step runs
    pub fn requires(&self) -> &'static [ContractName] {
        use ContractName::*;
        match self {
            ProvisioningStep::DeployWrappedNative
            | ProvisioningStep::DeployMockToken
            | ProvisioningStep::DeployFactory => &[],
            ProvisioningStep::DeployPairImplementation => &[LbFactory],
            ProvisioningStep::DeployRouter => &[LbFactory, WIota],
            ProvisioningStep::DeployQuoter => &[LbFactory, LbRouter],
            ProvisioningStep::SetPairImplementation => &[LbFactory, LbPair],
            ProvisioningStep::RegisterPresets => &[LbFactory],
            ProvisioningStep::WhitelistQuoteAsset => &[LbFactory, MockErc20],
            ProvisioningStep::CreatePair => &[LbFactory, WIota, MockErc20],
        }
    }

    /// Registry entry the step populates, if any
    pub fn produces(&self) -> Option<ContractName> {
        match self {
            ProvisioningStep::DeployWrappedNative => Some(ContractName::WIota),
            ProvisioningStep::DeployMockToken => Some(ContractName::MockErc20),
            ProvisioningStep::DeployFactory => Some(ContractName::LbFactory),
            ProvisioningStep::DeployPairImplementation => Some(ContractName::LbPair),
            ProvisioningStep::DeployRouter => Some(ContractName::LbRouter),
            ProvisioningStep::DeployQuoter => Some(ContractName::LbQuoter),
            _ => None,
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.name())
    }
}
