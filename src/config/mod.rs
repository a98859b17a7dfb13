//! Run configuration
//!
//! A JSON file; every field is optional and falls back to its default.
//! Validation happens on load, so a loaded config is always usable.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::flags::RuleThresholds;
use crate::linker::LinkPolicy;
use crate::money::{DisplayUnit, Rate};
use crate::observability::Severity;
use crate::reconcile::ReconcileOptions;

/// Exponents above this overflow the display arithmetic
const MAX_DISPLAY_EXPONENT: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Residual ratio above which a period is marked for review
    #[serde(default = "default_tolerance")]
    pub tolerance: Rate,

    #[serde(default)]
    pub display_unit: DisplayUnit,

    /// Network every input must come from
    #[serde(default = "default_expected_network")]
    pub expected_network: String,

    /// Accept other networks, marking the output in provenance notes
    #[serde(default)]
    pub allow_non_mainnet: bool,

    #[serde(default)]
    pub rules: RuleThresholds,

    /// Placeholder avatar ids that never count as a shared avatar
    #[serde(default)]
    pub default_avatar_ids: Vec<String>,

    /// Units reported in the registry concentration view
    #[serde(default = "default_registry_units")]
    pub registry_units: Vec<String>,

    /// Fan periods, link pairs and rules out across the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_tolerance() -> Rate {
    Rate::percent(25)
}

fn default_expected_network() -> String {
    "mainnet".to_string()
}

fn default_registry_units() -> Vec<String> {
    vec!["ADA".to_string(), "USD".to_string()]
}

fn default_parallel() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            display_unit: DisplayUnit::default(),
            expected_network: default_expected_network(),
            allow_non_mainnet: false,
            rules: RuleThresholds::default(),
            default_avatar_ids: Vec::new(),
            registry_units: default_registry_units(),
            parallel: default_parallel(),
            log_level: default_log_level(),
        }
    }
}

impl AuditConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: AuditConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> ConfigResult<()> {
        let json = self.to_json()?;
        fs::write(path, json + "\n").map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.tolerance.is_positive() {
            return Err(ConfigError::invalid("tolerance", "must be greater than zero"));
        }
        if self.display_unit.code.trim().is_empty() {
            return Err(ConfigError::invalid("display_unit.code", "must not be empty"));
        }
        if self.display_unit.exponent > MAX_DISPLAY_EXPONENT {
            return Err(ConfigError::invalid(
                "display_unit.exponent",
                format!("must be at most {}", MAX_DISPLAY_EXPONENT),
            ));
        }
        if self.expected_network.trim().is_empty() {
            return Err(ConfigError::invalid("expected_network", "must not be empty"));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::invalid(
                "log_level",
                format!("unknown level '{}'", self.log_level),
            ));
        }

        let rules = &self.rules;
        if !rules.residual_red_ratio.is_positive() {
            return Err(ConfigError::invalid("rules.residual_red_ratio", "must be greater than zero"));
        }
        if rules.heavy_recipient_percentile > 100 {
            return Err(ConfigError::invalid(
                "rules.heavy_recipient_percentile",
                "must be between 0 and 100",
            ));
        }
        if rules.heavy_recipient_unit.trim().is_empty() {
            return Err(ConfigError::invalid("rules.heavy_recipient_unit", "must not be empty"));
        }
        if rules.low_completion_min_funded == 0 {
            return Err(ConfigError::invalid(
                "rules.low_completion_min_funded",
                "must be at least 1",
            ));
        }
        if !rules.low_completion_ratio.is_unit_interval() {
            return Err(ConfigError::invalid("rules.low_completion_ratio", "must be within [0, 1]"));
        }
        if rules.payout_mismatch_ratio.numerator() < 0 {
            return Err(ConfigError::invalid("rules.payout_mismatch_ratio", "must not be negative"));
        }
        if rules.high_volume_projects == 0 {
            return Err(ConfigError::invalid("rules.high_volume_projects", "must be at least 1"));
        }
        Ok(())
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            tolerance: self.tolerance,
            display_unit: self.display_unit.clone(),
            parallel: self.parallel,
        }
    }

    pub fn link_policy(&self) -> LinkPolicy {
        LinkPolicy {
            default_avatar_ids: self.default_avatar_ids.iter().cloned().collect(),
            parallel: self.parallel,
        }
    }

    /// Validated on load, so unknown names cannot reach here
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_object_is_default() {
        let config = AuditConfig::from_json("{}").unwrap();
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.tolerance, Rate::parse("0.25").unwrap());
        assert_eq!(config.rules.heavy_recipient_percentile, 99);
    }

    #[test]
    fn test_partial_rules_keep_defaults() {
        let config = AuditConfig::from_json(
            r#"{"tolerance": "0.1", "rules": {"high_volume_projects": 20}}"#,
        )
        .unwrap();
        assert_eq!(config.tolerance, Rate::percent(10));
        assert_eq!(config.rules.high_volume_projects, 20);
        assert_eq!(config.rules.low_completion_min_funded, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{"tolerance": "0"}"#,
            r#"{"log_level": "LOUD"}"#,
            r#"{"rules": {"heavy_recipient_percentile": 101}}"#,
            r#"{"rules": {"low_completion_ratio": "1.5"}}"#,
            r#"{"display_unit": {"code": "", "exponent": 6}}"#,
        ] {
            assert!(
                matches!(AuditConfig::from_json(json), Err(ConfigError::Invalid { .. })),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.json");
        let mut config = AuditConfig::default();
        config.default_avatar_ids = vec!["placeholder".into()];
        config.write_to(&path).unwrap();

        let loaded = AuditConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.link_policy().default_avatar_ids.contains("placeholder"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = AuditConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
