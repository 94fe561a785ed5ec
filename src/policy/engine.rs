//! Constraint engine and policy profiles

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::policy::rules::{RuleSpec, Severity, Violation};

/// Evaluates an ordered rule set against decision contexts.
///
/// Rules run in registration order. A rule that fails to evaluate yields a
/// synthetic error-severity violation; the engine never aborts on malformed
/// input.
#[derive(Debug, Clone, Default)]
pub struct PolicyConstraintEngine {
    rules: Vec<RuleSpec>,
}

impl PolicyConstraintEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<RuleSpec>) -> Self {
        Self { rules }
    }

    pub fn add_rule(&mut self, rule: RuleSpec) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check a context, returning every violation.
    pub fn check(&self, context: &Map<String, Value>) -> Vec<Violation> {
        let mut violations = Vec::new();

        for rule in &self.rules {
            match rule.evaluate(context) {
                Ok(true) => {}
                Ok(false) => violations.push(Violation {
                    id: rule.id().to_string(),
                    severity: rule.severity(),
                    description: rule.description().to_string(),
                }),
                Err(message) => violations.push(Violation {
                    id: rule.id().to_string(),
                    severity: Severity::Error,
                    description: format!("Check failed: {}", message),
                }),
            }
        }

        if !violations.is_empty() {
            debug!("{} constraint violation(s)", violations.len());
        }
        violations
    }
}

/// Explicit registry of named policy profiles.
///
/// Constructed at startup and passed where needed; there is no process-wide
/// profile state.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Vec<RuleSpec>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in profiles.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("financial_basic", financial_basic_rules());
        registry
    }

    pub fn register(&mut self, name: &str, rules: Vec<RuleSpec>) {
        self.profiles.insert(name.to_string(), rules);
    }

    /// Build an engine from a named profile.
    pub fn build(&self, name: &str) -> Option<PolicyConstraintEngine> {
        self.profiles
            .get(name)
            .map(|rules| PolicyConstraintEngine::from_rules(rules.clone()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

/// The basic mortgage-lending policy profile.
pub fn financial_basic_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::RatioMax {
            id: "ltv_limit".to_string(),
            description: "Loan-to-value ratio must be <= 80%".to_string(),
            severity: Severity::High,
            numerator: "loan_amount".to_string(),
            denominator: "property_value".to_string(),
            max: 0.8,
            denominator_floor: 1.0,
        },
        RuleSpec::RatioMax {
            id: "dsr_limit".to_string(),
            description: "Debt service ratio must be <= 35%".to_string(),
            severity: Severity::High,
            numerator: "monthly_debt".to_string(),
            denominator: "monthly_income".to_string(),
            max: 0.35,
            denominator_floor: 1.0,
        },
        RuleSpec::FieldAtMostField {
            id: "var_limit".to_string(),
            description: "VaR must be within limit".to_string(),
            severity: Severity::Critical,
            field: "marginal_var".to_string(),
            limit_field: "var_limit".to_string(),
            default_limit: 1.0,
        },
        RuleSpec::AllPositive {
            id: "positive_amounts".to_string(),
            description: "All amounts must be positive".to_string(),
            severity: Severity::Critical,
            fields: vec![
                "loan_amount".to_string(),
                "property_value".to_string(),
                "monthly_income".to_string(),
            ],
        },
    ]
}
