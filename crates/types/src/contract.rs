use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical names of the contracts tracked in the address registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractName {
    #[serde(rename = "wIOTA")]
    WIota,
    #[serde(rename = "MockERC20")]
    MockErc20,
    #[serde(rename = "LBFactory")]
    LbFactory,
    #[serde(rename = "LBPair")]
    LbPair,
    #[serde(rename = "LBRouter")]
    LbRouter,
    #[serde(rename = "LBQuoter")]
    LbQuoter,
}

impl ContractName {
    /// All contracts in provisioning order
    pub const ALL: [ContractName; 6] = [
        ContractName::WIota,
        ContractName::MockErc20,
        ContractName::LbFactory,
        ContractName::LbPair,
        ContractName::LbRouter,
        ContractName::LbQuoter,
    ];

    /// Contracts redeployed on every run by the legacy deployment flow
    pub const CORE: [ContractName; 4] = [
        ContractName::LbFactory,
        ContractName::LbPair,
        ContractName::LbRouter,
        ContractName::LbQuoter,
    ];

    /// Registry key, also the artifact name used for deployment
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::WIota => "wIOTA",
            ContractName::MockErc20 => "MockERC20",
            ContractName::LbFactory => "LBFactory",
            ContractName::LbPair => "LBPair",
            ContractName::LbRouter => "LBRouter",
            ContractName::LbQuoter => "LBQuoter",
        }
    }

    /// Contracts whose addresses are baked into this contract at construction
    pub fn dependencies(&self) -> &'static [ContractName] {
        match self {
            ContractName::WIota | ContractName::MockErc20 | ContractName::LbFactory => &[],
            ContractName::LbPair => &[ContractName::LbFactory],
            ContractName::LbRouter => &[ContractName::LbFactory, ContractName::WIota],
            ContractName::LbQuoter => &[ContractName::LbFactory, ContractName::LbRouter],
        }
    }

    /// Contracts that were constructed with this contract's address
    pub fn dependents(&self) -> Vec<ContractName> {
        ContractName::ALL
            .into_iter()
            .filter(|other| other.dependencies().contains(self))
            .collect()
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown contract name '{0}'")]
pub struct UnknownContract(pub String);

impl FromStr for ContractName {
    type Err = UnknownContract;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownContract(s.to_string()))
    }
}
