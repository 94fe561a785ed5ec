//! System configuration
//!
//! Every tunable parameter lives in one struct so a deployment can be
//! described by a single YAML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AuditError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    // Privacy
    pub max_epsilon: f64,
    pub epsilon_per_decision: f64,
    pub privacy_sensitivity: f64,

    // Bounds for clamping noised amounts
    pub amount_min: f64,
    pub amount_max: f64,

    /// Context fields that are noised (or omitted) before persistence.
    pub sensitive_fields: Vec<String>,

    // Drift detection
    pub drift_window_size: usize,
    pub drift_threshold: f64,
    pub min_test_samples: usize,

    // Storage; in-memory only when unset
    pub ledger_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,

    pub schema_version: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_epsilon: 10.0,
            epsilon_per_decision: 0.01,
            privacy_sensitivity: 1000.0,
            amount_min: 0.0,
            amount_max: 10_000_000.0,
            sensitive_fields: vec![
                "loan_amount".to_string(),
                "property_value".to_string(),
                "monthly_income".to_string(),
                "monthly_debt".to_string(),
            ],
            drift_window_size: 100,
            drift_threshold: 3.0,
            min_test_samples: 20,
            ledger_path: None,
            key_path: None,
            schema_version: "1.0.0".to_string(),
        }
    }
}

impl AuditConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AuditError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: AuditConfig = serde_yaml::from_str(&content).map_err(|e| {
            AuditError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_epsilon <= 0.0 {
            return Err(AuditError::ConfigError(
                "max_epsilon must be positive".to_string(),
            ));
        }
        if self.epsilon_per_decision <= 0.0 {
            return Err(AuditError::ConfigError(
                "epsilon_per_decision must be positive".to_string(),
            ));
        }
        if self.drift_window_size == 0 {
            return Err(AuditError::ConfigError(
                "drift_window_size must be at least 1".to_string(),
            ));
        }
        if self.amount_min > self.amount_max {
            return Err(AuditError::ConfigError(format!(
                "amount_min {} exceeds amount_max {}",
                self.amount_min, self.amount_max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_epsilon, 10.0);
        assert_eq!(config.drift_window_size, 100);
        assert!(config.sensitive_fields.contains(&"loan_amount".to_string()));
    }

    #[test]
    fn test_yaml_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.yaml");

        let yaml = "max_epsilon: 20.0\ndrift_threshold: 2.5\ndrift_window_size: 50\n";
        fs::write(&path, yaml).unwrap();

        let config = AuditConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.max_epsilon, 20.0);
        assert_eq!(config.drift_threshold, 2.5);
        assert_eq!(config.drift_window_size, 50);
        // Unspecified fields keep their defaults.
        assert_eq!(config.epsilon_per_decision, 0.01);
    }

    #[test]
    fn test_invalid_budget_rejected() {
        let config = AuditConfig {
            max_epsilon: 0.0,
            ..AuditConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
