use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Largest filter/decay period the factory accepts (12 bits)
pub const MAX_PERIOD: u16 = 4_095;

/// Basis point denominator used by the reduction factor
pub const BASIS_POINT_MAX: u16 = 10_000;

/// Upper bound on the protocol share of swap fees (25%)
pub const MAX_PROTOCOL_SHARE: u16 = 2_500;

/// Exclusive upper bound of the 24-bit variable fee control
pub const MAX_VARIABLE_FEE_CONTROL: u32 = 1 << 24;

/// Exclusive upper bound of the 20-bit volatility accumulator
pub const MAX_VOLATILITY_ACCUMULATED: u32 = 1 << 20;

/// Fee and volatility parameters registered on the factory for one bin step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub bin_step: u16,
    pub base_factor: u16,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub variable_fee_control: u32,
    pub protocol_share: u16,
    pub max_volatility_accumulated: u32,
    pub sample_lifetime: u16,
    #[serde(default)]
    pub is_open: bool,
}

impl PresetEntry {
    /// Check every field against the ranges the factory accepts
    pub fn validate(&self) -> Result<(), PresetError> {
        let invalid = |field: &'static str, reason: String| PresetError::InvalidPreset {
            bin_step: self.bin_step,
            field,
            reason,
        };

        if self.bin_step == 0 {
            return Err(invalid("bin_step", "must be greater than 0".to_string()));
        }

        if self.filter_period >= self.decay_period {
            return Err(invalid(
                "filter_period",
                format!(
                    "must be lower than decay_period ({} >= {})",
                    self.filter_period, self.decay_period
                ),
            ));
        }

        if self.decay_period > MAX_PERIOD {
            return Err(invalid(
                "decay_period",
                format!("must be <= {MAX_PERIOD}, got {}", self.decay_period),
            ));
        }

        if self.reduction_factor > BASIS_POINT_MAX {
            return Err(invalid(
                "reduction_factor",
                format!("must be <= {BASIS_POINT_MAX}, got {}", self.reduction_factor),
            ));
        }

        if self.variable_fee_control >= MAX_VARIABLE_FEE_CONTROL {
            return Err(invalid(
                "variable_fee_control",
                format!("must fit in 24 bits, got {}", self.variable_fee_control),
            ));
        }

        if self.protocol_share > MAX_PROTOCOL_SHARE {
            return Err(invalid(
                "protocol_share",
                format!("must be <= {MAX_PROTOCOL_SHARE}, got {}", self.protocol_share),
            ));
        }

        if self.max_volatility_accumulated >= MAX_VOLATILITY_ACCUMULATED {
            return Err(invalid(
                "max_volatility_accumulated",
                format!("must fit in 20 bits, got {}", self.max_volatility_accumulated),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("unsupported bin step {bin_step}")]
    UnsupportedGranularity { bin_step: u16 },

    #[error("duplicate preset for bin step {bin_step}")]
    DuplicatePreset { bin_step: u16 },

    #[error("invalid preset for bin step {bin_step}: {field} {reason}")]
    InvalidPreset {
        bin_step: u16,
        field: &'static str,
        reason: String,
    },

    #[error("preset catalog is empty")]
    EmptyCatalog,
}

/// Closed set of presets keyed by bin step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    entries: BTreeMap<u16, PresetEntry>,
}

impl PresetCatalog {
    /// Build a catalog from an explicit list of presets
    pub fn new(entries: impl IntoIterator<Item = PresetEntry>) -> Result<Self, PresetError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            entry.validate()?;
            let bin_step = entry.bin_step;
            if map.insert(bin_step, entry).is_some() {
                return Err(PresetError::DuplicatePreset { bin_step });
            }
        }

        if map.is_empty() {
            return Err(PresetError::EmptyCatalog);
        }

        Ok(Self { entries: map })
    }

    /// The presets shipped with the exchange deployment
    pub fn standard() -> Self {
        let entries = [
            standard_preset(1, 20_000, 10, 120, 2_000_000, 100_000),
            standard_preset(2, 15_000, 10, 120, 500_000, 250_000),
            standard_preset(5, 8_000, 30, 600, 120_000, 300_000),
            standard_preset(10, 10_000, 30, 600, 40_000, 350_000),
            standard_preset(15, 10_000, 30, 600, 30_000, 350_000),
            standard_preset(20, 10_000, 30, 600, 20_000, 350_000),
            standard_preset(25, 10_000, 30, 600, 15_000, 350_000),
        ];

        Self {
            entries: entries.into_iter().map(|e| (e.bin_step, e)).collect(),
        }
    }

    pub fn get_preset(&self, bin_step: u16) -> Result<&PresetEntry, PresetError> {
        self.entries
            .get(&bin_step)
            .ok_or(PresetError::UnsupportedGranularity { bin_step })
    }

    /// Supported bin steps in ascending order
    pub fn supported_granularities(&self) -> Vec<u16> {
        self.entries.keys().copied().collect()
    }

    pub fn contains(&self, bin_step: u16) -> bool {
        self.entries.contains_key(&bin_step)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresetEntry> {
        self.entries.values()
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_preset(
    bin_step: u16,
    base_factor: u16,
    filter_period: u16,
    decay_period: u16,
    variable_fee_control: u32,
    max_volatility_accumulated: u32,
) -> PresetEntry {
    PresetEntry {
        bin_step,
        base_factor,
        filter_period,
        decay_period,
        reduction_factor: 5_000,
        variable_fee_control,
        protocol_share: 0,
        max_volatility_accumulated,
        sample_lifetime: 120,
        is_open: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_granularities() {
        let catalog = PresetCatalog::standard();
        assert_eq!(
            catalog.supported_granularities(),
            vec![1, 2, 5, 10, 15, 20, 25]
        );
    }

    #[test]
    fn test_get_preset_is_deterministic() {
        let catalog = PresetCatalog::standard();
        for bin_step in catalog.supported_granularities() {
            let first = catalog.get_preset(bin_step).unwrap().clone();
            let second = catalog.get_preset(bin_step).unwrap();
            assert_eq!(&first, second);
            assert_eq!(first.bin_step, bin_step);
            assert!(first.validate().is_ok());
        }
    }

    #[test]
    fn test_bin_step_20_values() {
        let catalog = PresetCatalog::standard();
        let preset = catalog.get_preset(20).unwrap();
        assert_eq!(preset.base_factor, 10_000);
        assert_eq!(preset.filter_period, 30);
        assert_eq!(preset.decay_period, 600);
        assert_eq!(preset.reduction_factor, 5_000);
        assert_eq!(preset.variable_fee_control, 20_000);
        assert_eq!(preset.protocol_share, 0);
        assert_eq!(preset.max_volatility_accumulated, 350_000);
        assert_eq!(preset.sample_lifetime, 120);
        assert!(!preset.is_open);
    }

    #[test]
    fn test_unsupported_granularity() {
        let catalog = PresetCatalog::standard();
        for bin_step in [0, 3, 4, 50, 100, u16::MAX] {
            assert_eq!(
                catalog.get_preset(bin_step),
                Err(PresetError::UnsupportedGranularity { bin_step })
            );
        }
    }

    #[test]
    fn test_custom_catalog_rejects_duplicates() {
        let preset = PresetCatalog::standard().get_preset(5).unwrap().clone();
        let result = PresetCatalog::new(vec![preset.clone(), preset]);
        assert_eq!(result, Err(PresetError::DuplicatePreset { bin_step: 5 }));
    }

    #[test]
    fn test_custom_catalog_rejects_empty() {
        assert_eq!(PresetCatalog::new(vec![]), Err(PresetError::EmptyCatalog));
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let base = PresetCatalog::standard().get_preset(10).unwrap().clone();

        let mut preset = base.clone();
        preset.filter_period = preset.decay_period;
        assert!(matches!(
            preset.validate(),
            Err(PresetError::InvalidPreset { field: "filter_period", .. })
        ));

        let mut preset = base.clone();
        preset.protocol_share = 2_501;
        assert!(matches!(
            preset.validate(),
            Err(PresetError::InvalidPreset { field: "protocol_share", .. })
        ));

        let mut preset = base.clone();
        preset.variable_fee_control = 1 << 24;
        assert!(preset.validate().is_err());

        let mut preset = base;
        preset.bin_step = 0;
        assert!(preset.validate().is_err());
    }

    #[test]
    fn test_preset_serde_defaults_is_open() {
        let json = r#"{
            "bin_step": 50,
            "base_factor": 8000,
            "filter_period": 30,
            "decay_period": 600,
            "reduction_factor": 5000,
            "variable_fee_control": 7500,
            "protocol_share": 0,
            "max_volatility_accumulated": 150000,
            "sample_lifetime": 120
        }"#;

        let preset: PresetEntry = serde_json::from_str(json).unwrap();
        assert!(!preset.is_open);
        assert!(PresetCatalog::new(vec![preset]).unwrap().contains(50));
    }
}
