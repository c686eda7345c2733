//! Configuration validation

use crate::{AppConfig, Backend, ConfigError, NetworkConfig, Result};
use lb_bootstrap_liquidity::generate_curve;

/// Active ids are 24-bit
const MAX_ACTIVE_ID: u32 = (1 << 24) - 1;

/// The factory refuses flash loan fees above 10%
const MAX_FLASH_LOAN_FEE: u128 = 100_000_000_000_000_000;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration, reporting every problem
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    // Deployment
    let deployment = &config.deployment;
    match config.preset_catalog() {
        Ok(catalog) => {
            let bin_steps = std::iter::once(deployment.bin_step)
                .chain(deployment.preset_bin_steps.iter().copied());
            for bin_step in bin_steps {
                if !catalog.contains(bin_step) {
                    errors.push(ValidationError::new(
                        "deployment.bin_step",
                        format!(
                            "no preset for bin step {bin_step}; supported: {:?}",
                            catalog.supported_granularities()
                        ),
                    ));
                }
            }
        }
        Err(e) => errors.push(ValidationError::new("presets", e.to_string())),
    }

    if deployment.active_id > MAX_ACTIVE_ID {
        errors.push(ValidationError::new(
            "deployment.active_id",
            format!("must be <= {MAX_ACTIVE_ID}"),
        ));
    }

    if deployment.flash_loan_fee > MAX_FLASH_LOAN_FEE {
        errors.push(ValidationError::new(
            "deployment.flash_loan_fee",
            "must be <= 1e17 (10%)",
        ));
    }

    if deployment.mock_token.name.is_empty() {
        errors.push(ValidationError::new(
            "deployment.mock_token.name",
            "token name is required",
        ));
    }

    if deployment.mock_token.symbol.is_empty() {
        errors.push(ValidationError::new(
            "deployment.mock_token.symbol",
            "token symbol is required",
        ));
    }

    // Liquidity
    if config.liquidity.deadline_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "liquidity.deadline_ttl_secs",
            "must be greater than 0",
        ));
    }

    if config.liquidity.bins == 0 {
        errors.push(ValidationError::new(
            "liquidity.bins",
            "must be greater than 0",
        ));
    } else if let Err(e) = generate_curve(&config.liquidity.curve, config.liquidity.bins) {
        errors.push(ValidationError::new("liquidity.curve", e.to_string()));
    }

    // Networks
    if config.networks.is_empty() {
        errors.push(ValidationError::new(
            "networks",
            "at least one network must be configured",
        ));
    }

    for (name, network) in &config.networks {
        if let Err(e) = validate_network_config(network) {
            errors.push(ValidationError::new(format!("networks.{name}"), e));
        }
    }

    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate one network entry
pub fn validate_network_config(network: &NetworkConfig) -> std::result::Result<(), String> {
    if network.backend == Backend::Rpc {
        let url = network
            .rpc_url
            .as_deref()
            .ok_or_else(|| "rpc_url is required for the rpc backend".to_string())?;
        validate_url(url)?;
    }

    if network.backend == Backend::Simulated && network.ephemeral == Some(false) {
        return Err("a simulated network cannot persist deployments".to_string());
    }

    if network.poll_interval_ms == 0 {
        return Err("poll_interval_ms must be greater than 0".to_string());
    }

    if network.max_poll_interval_ms < network.poll_interval_ms {
        return Err("max_poll_interval_ms must be >= poll_interval_ms".to_string());
    }

    if network.request_timeout_secs == 0 {
        return Err("request_timeout_secs must be greater than 0".to_string());
    }

    if network.confirmation_timeout_secs == Some(0) {
        return Err("confirmation_timeout_secs must be greater than 0 when set".to_string());
    }

    Ok(())
}

/// Validate a URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_bootstrap_liquidity::{CurveProfile, CurveShape, Placement};

    #[test]
    fn test_default_config_is_valid() {
        validate_config(&AppConfig::default()).unwrap();
    }

    #[test]
    fn test_unsupported_bin_step() {
        let mut config = AppConfig::default();
        config.deployment.bin_step = 30;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("deployment.bin_step"));
        assert!(err.contains("30"));
    }

    #[test]
    fn test_unsupported_extra_preset() {
        let mut config = AppConfig::default();
        config.deployment.preset_bin_steps = vec![1, 7];

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("bin step 7"));
        assert!(!err.contains("bin step 1;"));
    }

    #[test]
    fn test_active_id_range() {
        let mut config = AppConfig::default();
        config.deployment.active_id = 1 << 24;
        assert!(validate_config(&config).is_err());

        config.deployment.active_id = MAX_ACTIVE_ID;
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_flash_loan_fee_cap() {
        let mut config = AppConfig::default();
        config.deployment.flash_loan_fee = MAX_FLASH_LOAN_FEE + 1;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("deployment.flash_loan_fee"));
    }

    #[test]
    fn test_invalid_curve_reported() {
        let mut config = AppConfig::default();
        config.liquidity.curve = CurveShape::new(
            CurveProfile::Gaussian { sigma: Some(-1.0) },
            Placement::AskSide,
        );

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("liquidity.curve"));
    }

    #[test]
    fn test_rpc_network_requires_url() {
        let mut network = NetworkConfig::simulated();
        network.backend = Backend::Rpc;
        assert!(validate_network_config(&network).is_err());

        network.rpc_url = Some("ws://127.0.0.1:8546".to_string());
        assert!(validate_network_config(&network).is_err());

        network.rpc_url = Some("http://127.0.0.1:8545".to_string());
        validate_network_config(&network).unwrap();
    }

    #[test]
    fn test_simulated_network_cannot_persist() {
        let mut network = NetworkConfig::simulated();
        network.ephemeral = Some(false);
        assert!(validate_network_config(&network).is_err());
    }

    #[test]
    fn test_poll_intervals() {
        let mut network = NetworkConfig::simulated();
        network.max_poll_interval_ms = network.poll_interval_ms - 1;
        assert!(validate_network_config(&network).is_err());

        network.max_poll_interval_ms = network.poll_interval_ms;
        network.confirmation_timeout_secs = Some(0);
        assert!(validate_network_config(&network).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        config.liquidity.deadline_ttl_secs = 0;
        config.deployment.mock_token.symbol.clear();

        let err = validate_config(&config).unwrap_err().to_string();
        assert_eq!(err.matches("; ").count(), 2);
        assert!(err.contains("logging.level"));
        assert!(err.contains("liquidity.deadline_ttl_secs"));
        assert!(err.contains("deployment.mock_token.symbol"));
    }
}
