//! Rule-set loader
//!
//! Loads an ordered list of rule specifications from YAML and builds a
//! constraint engine.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{AuditError, Result};
use crate::policy::engine::PolicyConstraintEngine;
use crate::policy::rules::RuleSpec;

#[derive(Debug, Deserialize)]
struct RuleSetFile {
    rules: Vec<RuleSpec>,
}

/// Parse a YAML rule-set document.
pub fn parse_rule_set(yaml: &str) -> Result<PolicyConstraintEngine> {
    let file: RuleSetFile = serde_yaml::from_str(yaml)
        .map_err(|e| AuditError::RuleSetError(format!("Failed to parse rule set: {}", e)))?;
    Ok(PolicyConstraintEngine::from_rules(file.rules))
}

/// Load a rule set from a YAML file.
pub fn load_rule_set<P: AsRef<Path>>(path: P) -> Result<PolicyConstraintEngine> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| AuditError::RuleSetError(format!("Failed to read {}: {}", path.display(), e)))?;

    let engine = parse_rule_set(&content)?;
    info!("Loaded {} rules from {}", engine.len(), path.display());
    Ok(engine)
}
