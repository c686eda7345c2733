//! Core configuration structures

use lb_bootstrap_liquidity::{CurveShape, DEFAULT_DEADLINE_TTL_SECS};
use lb_bootstrap_types::{
    Address, ContractName, Network, PresetCatalog, PresetEntry, PresetError, EPHEMERAL_NETWORK,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub liquidity: LiquidityConfig,

    /// Target networks by name
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,

    /// Replaces the built-in preset catalog when present
    #[serde(default)]
    pub presets: Option<Vec<PresetEntry>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            deployment: DeploymentConfig::default(),
            liquidity: LiquidityConfig::default(),
            networks: default_networks(),
            presets: None,
        }
    }
}

impl AppConfig {
    /// Settings of a configured network together with its identity
    pub fn network(&self, name: &str) -> Result<(Network, &NetworkConfig)> {
        let settings = self
            .networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                name: name.to_string(),
                known: self.networks.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;
        Ok((settings.identity(name), settings))
    }

    /// Configured presets, or the standard catalog
    pub fn preset_catalog(&self) -> std::result::Result<PresetCatalog, PresetError> {
        match &self.presets {
            Some(entries) => PresetCatalog::new(entries.iter().cloned()),
            None => Ok(PresetCatalog::standard()),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// What the provisioning pipeline deploys and how the pair is set up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Directory holding one `<network>.json` registry per network
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,

    #[serde(default = "default_bin_step")]
    pub bin_step: u16,

    #[serde(default = "default_active_id")]
    pub active_id: u32,

    /// Additional bin steps to register on the factory
    #[serde(default)]
    pub preset_bin_steps: Vec<u16>,

    /// 1e18 = 100%
    #[serde(default = "default_flash_loan_fee")]
    pub flash_loan_fee: u128,

    /// Defaults to the signer
    #[serde(default)]
    pub fee_recipient: Option<Address>,

    /// Defaults to the signer
    #[serde(default)]
    pub owner: Option<Address>,

    /// Contracts to redeploy even when recorded
    #[serde(default)]
    pub redeploy: Vec<ContractName>,

    /// Redeploy factory, pair implementation, router and quoter on every run
    #[serde(default)]
    pub redeploy_core: bool,

    #[serde(default)]
    pub mock_token: MockTokenConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployments_dir: default_deployments_dir(),
            bin_step: default_bin_step(),
            active_id: default_active_id(),
            preset_bin_steps: Vec::new(),
            flash_loan_fee: default_flash_loan_fee(),
            fee_recipient: None,
            owner: None,
            redeploy: Vec::new(),
            redeploy_core: false,
            mock_token: MockTokenConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockTokenConfig {
    #[serde(default = "default_token_name")]
    pub name: String,

    #[serde(default = "default_token_symbol")]
    pub symbol: String,

    #[serde(default = "default_token_decimals")]
    pub decimals: u8,
}

impl Default for MockTokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            decimals: default_token_decimals(),
        }
    }
}

/// Defaults for liquidity operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Deadline offset applied when none is given explicitly
    #[serde(default = "default_deadline_ttl_secs")]
    pub deadline_ttl_secs: u64,

    /// Tolerated drift of the active id between submission and inclusion
    #[serde(default = "default_id_slippage")]
    pub id_slippage: u32,

    /// Number of bins seeded by a generated curve
    #[serde(default = "default_bins")]
    pub bins: usize,

    #[serde(default = "default_curve")]
    pub curve: CurveShape,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            deadline_ttl_secs: default_deadline_ttl_secs(),
            id_slippage: default_id_slippage(),
            bins: default_bins(),
            curve: default_curve(),
        }
    }
}

/// How operations reach a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON-RPC signing gateway
    Rpc,
    /// In-process simulated chain
    Simulated,
}

/// Settings for one target network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Gateway endpoint, required for the RPC backend
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Signing account; asked from the gateway when absent
    #[serde(default)]
    pub signer: Option<Address>,

    /// Overrides the default: `hardhat` and every simulated network are ephemeral
    #[serde(default)]
    pub ephemeral: Option<bool>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Give up waiting for a receipt after this long; wait forever when unset
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn simulated() -> Self {
        Self {
            backend: Backend::Simulated,
            rpc_url: None,
            signer: None,
            ephemeral: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            confirmation_timeout_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn rpc(url: impl Into<String>) -> Self {
        Self {
            backend: Backend::Rpc,
            rpc_url: Some(url.into()),
            ..Self::simulated()
        }
    }

    /// Network identity; a simulated chain vanishes with the process, so its
    /// deployments are never worth persisting
    pub fn identity(&self, name: &str) -> Network {
        match (self.ephemeral, self.backend) {
            (Some(true), _) | (None, Backend::Simulated) => Network::ephemeral(name),
            (Some(false), _) => Network::persistent(name),
            (None, Backend::Rpc) => Network::new(name),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_deployments_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_bin_step() -> u16 {
    20
}

fn default_active_id() -> u32 {
    8_373_869
}

fn default_flash_loan_fee() -> u128 {
    5_000_000_000_000 // 0.0005%
}

fn default_token_name() -> String {
    "MockERC20".to_string()
}

fn default_token_symbol() -> String {
    "mERC20".to_string()
}

fn default_token_decimals() -> u8 {
    18
}

fn default_deadline_ttl_secs() -> u64 {
    DEFAULT_DEADLINE_TTL_SECS
}

fn default_id_slippage() -> u32 {
    2
}

fn default_bins() -> usize {
    40
}

fn default_curve() -> CurveShape {
    CurveShape::default().with_offset(211)
}

fn default_backend() -> Backend {
    Backend::Rpc
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_interval_ms() -> u64 {
    8_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([(EPHEMERAL_NETWORK.to_string(), NetworkConfig::simulated())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_ephemeral_simulated_network() {
        let config = AppConfig::default();
        let (network, settings) = config.network("hardhat").unwrap();

        assert!(network.ephemeral);
        assert_eq!(settings.backend, Backend::Simulated);
        assert_eq!(config.deployment.bin_step, 20);
        assert_eq!(config.deployment.active_id, 8_373_869);
        assert_eq!(config.liquidity.deadline_ttl_secs, 600);
        assert_eq!(config.liquidity.curve.offset, 211);
    }

    #[test]
    fn test_unknown_network() {
        let err = AppConfig::default().network("mainnet").unwrap_err();
        assert!(err.to_string().contains("hardhat"));
    }

    #[test]
    fn test_ephemeral_override() {
        let mut settings = NetworkConfig::rpc("http://127.0.0.1:8545");
        assert!(!settings.identity("local_geth").ephemeral);

        settings.ephemeral = Some(true);
        assert!(settings.identity("local_geth").ephemeral);

        settings.ephemeral = Some(false);
        assert!(!settings.identity("hardhat").ephemeral);
    }

    #[test]
    fn test_simulated_networks_are_ephemeral() {
        let settings = NetworkConfig::simulated();
        assert!(settings.identity("scratch").ephemeral);
    }

    #[test]
    fn test_preset_override_replaces_catalog() {
        let mut config = AppConfig::default();
        let mut entry = PresetCatalog::standard().get_preset(20).unwrap().clone();
        entry.bin_step = 40;
        config.presets = Some(vec![entry]);

        let catalog = config.preset_catalog().unwrap();
        assert_eq!(catalog.supported_granularities(), vec![40]);
    }
}
