//! Rule specifications and their evaluation
//!
//! Each kind carries typed parameters. Missing-field handling follows the
//! per-kind defaults documented on the variants; any evaluation failure is
//! reported to the engine, never raised.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    High,
    Critical,
    /// Reserved for synthetic violations produced when a rule fails to evaluate.
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Error => "error",
        }
    }
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub severity: Severity,
    pub description: String,
}

fn default_denominator_floor() -> f64 {
    1.0
}

fn default_limit() -> f64 {
    1.0
}

/// Declarative rule specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// `numerator / denominator <= max`. A missing numerator reads as 0.0, a
    /// missing denominator as 1.0; the denominator is floored to avoid
    /// division blow-up.
    RatioMax {
        id: String,
        description: String,
        severity: Severity,
        numerator: String,
        denominator: String,
        max: f64,
        #[serde(default = "default_denominator_floor")]
        denominator_floor: f64,
    },
    /// `field <= limit_field`, with `default_limit` standing in for a
    /// missing limit field. A missing field reads as 0.0.
    FieldAtMostField {
        id: String,
        description: String,
        severity: Severity,
        field: String,
        limit_field: String,
        #[serde(default = "default_limit")]
        default_limit: f64,
    },
    /// Every listed field must be strictly positive; missing fields read as
    /// 0.0 and therefore violate the rule.
    AllPositive {
        id: String,
        description: String,
        severity: Severity,
        fields: Vec<String>,
    },
    /// `field <= max`; the field must be present.
    ValueAtMost {
        id: String,
        description: String,
        severity: Severity,
        field: String,
        max: f64,
    },
    /// `field >= min`; the field must be present.
    ValueAtLeast {
        id: String,
        description: String,
        severity: Severity,
        field: String,
        min: f64,
    },
}

/// Numeric lookup: `Ok(None)` when absent, `Err` when present but not a number.
fn numeric_field(
    context: &Map<String, Value>,
    name: &str,
) -> std::result::Result<Option<f64>, String> {
    match context.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("field `{}` is not numeric", name)),
    }
}

impl RuleSpec {
    pub fn id(&self) -> &str {
        match self {
            RuleSpec::RatioMax { id, .. }
            | RuleSpec::FieldAtMostField { id, .. }
            | RuleSpec::AllPositive { id, .. }
            | RuleSpec::ValueAtMost { id, .. }
            | RuleSpec::ValueAtLeast { id, .. } => id,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RuleSpec::RatioMax { severity, .. }
            | RuleSpec::FieldAtMostField { severity, .. }
            | RuleSpec::AllPositive { severity, .. }
            | RuleSpec::ValueAtMost { severity, .. }
            | RuleSpec::ValueAtLeast { severity, .. } => *severity,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RuleSpec::RatioMax { description, .. }
            | RuleSpec::FieldAtMostField { description, .. }
            | RuleSpec::AllPositive { description, .. }
            | RuleSpec::ValueAtMost { description, .. }
            | RuleSpec::ValueAtLeast { description, .. } => description,
        }
    }

    /// Evaluate against a context map.
    ///
    /// `Ok(true)` means the constraint is satisfied. An `Err` carries the
    /// evaluation-failure message for the engine to convert into an
    /// error-severity violation.
    pub fn evaluate(&self, context: &Map<String, Value>) -> std::result::Result<bool, String> {
        match self {
            RuleSpec::RatioMax {
                numerator,
                denominator,
                max,
                denominator_floor,
                ..
            } => {
                let num = numeric_field(context, numerator)?.unwrap_or(0.0);
                let den = numeric_field(context, denominator)?
                    .unwrap_or(1.0)
                    .max(*denominator_floor);
                Ok(num / den <= *max)
            }
            RuleSpec::FieldAtMostField {
                field,
                limit_field,
                default_limit,
                ..
            } => {
                let value = numeric_field(context, field)?.unwrap_or(0.0);
                let limit = numeric_field(context, limit_field)?.unwrap_or(*default_limit);
                Ok(value <= limit)
            }
            RuleSpec::AllPositive { fields, .. } => {
                for name in fields {
                    if numeric_field(context, name)?.unwrap_or(0.0) <= 0.0 {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            RuleSpec::ValueAtMost { field, max, .. } => {
                let value = numeric_field(context, field)?
                    .ok_or_else(|| format!("missing field `{}`", field))?;
                Ok(value <= *max)
            }
            RuleSpec::ValueAtLeast { field, min, .. } => {
                let value = numeric_field(context, field)?
                    .ok_or_else(|| format!("missing field `{}`", field))?;
                Ok(value >= *min)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ratio_rule(max: f64) -> RuleSpec {
        RuleSpec::RatioMax {
            id: "ltv".to_string(),
            description: "LTV cap".to_string(),
            severity: Severity::High,
            numerator: "loan_amount".to_string(),
            denominator: "property_value".to_string(),
            max,
            denominator_floor: 1.0,
        }
    }

    #[test]
    fn test_ratio_max() {
        let rule = ratio_rule(0.8);
        assert_eq!(
            rule.evaluate(&ctx(&[
                ("loan_amount", json!(100_000)),
                ("property_value", json!(150_000)),
            ])),
            Ok(true)
        );
        assert_eq!(
            rule.evaluate(&ctx(&[
                ("loan_amount", json!(200_000)),
                ("property_value", json!(210_000)),
            ])),
            Ok(false)
        );
    }

    #[test]
    fn test_ratio_denominator_floor() {
        let rule = ratio_rule(0.8);
        // Zero denominator is floored to 1.0 rather than dividing by zero.
        let result = rule.evaluate(&ctx(&[
            ("loan_amount", json!(10.0)),
            ("property_value", json!(0.0)),
        ]));
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn test_ratio_missing_fields_use_defaults() {
        let rule = ratio_rule(0.8);
        // numerator -> 0.0, denominator -> 1.0: 0/1 <= 0.8
        assert_eq!(rule.evaluate(&Map::new()), Ok(true));
    }

    #[test]
    fn test_non_numeric_field_is_evaluation_error() {
        let rule = ratio_rule(0.8);
        let result = rule.evaluate(&ctx(&[("loan_amount", json!("lots"))]));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("loan_amount"));
    }

    #[test]
    fn test_field_at_most_field_default_limit() {
        let rule = RuleSpec::FieldAtMostField {
            id: "var_limit".to_string(),
            description: "VaR within limit".to_string(),
            severity: Severity::Critical,
            field: "marginal_var".to_string(),
            limit_field: "var_limit".to_string(),
            default_limit: 1.0,
        };

        assert_eq!(
            rule.evaluate(&ctx(&[("marginal_var", json!(0.5))])),
            Ok(true)
        );
        assert_eq!(
            rule.evaluate(&ctx(&[("marginal_var", json!(1.5))])),
            Ok(false)
        );
        assert_eq!(
            rule.evaluate(&ctx(&[
                ("marginal_var", json!(1.5)),
                ("var_limit", json!(2.0)),
            ])),
            Ok(true)
        );
    }

    #[test]
    fn test_all_positive() {
        let rule = RuleSpec::AllPositive {
            id: "positive_amounts".to_string(),
            description: "All amounts must be positive".to_string(),
            severity: Severity::Critical,
            fields: vec!["loan_amount".to_string(), "monthly_income".to_string()],
        };

        assert_eq!(
            rule.evaluate(&ctx(&[
                ("loan_amount", json!(1.0)),
                ("monthly_income", json!(2.0)),
            ])),
            Ok(true)
        );
        assert_eq!(
            rule.evaluate(&ctx(&[
                ("loan_amount", json!(-1.0)),
                ("monthly_income", json!(2.0)),
            ])),
            Ok(false)
        );
        // Missing field reads as zero and violates.
        assert_eq!(
            rule.evaluate(&ctx(&[("loan_amount", json!(1.0))])),
            Ok(false)
        );
    }

    #[test]
    fn test_value_bounds_require_field() {
        let at_most = RuleSpec::ValueAtMost {
            id: "score_cap".to_string(),
            description: "score cap".to_string(),
            severity: Severity::Info,
            field: "score".to_string(),
            max: 1.0,
        };
        assert_eq!(at_most.evaluate(&ctx(&[("score", json!(0.9))])), Ok(true));
        assert!(at_most.evaluate(&Map::new()).is_err());

        let at_least = RuleSpec::ValueAtLeast {
            id: "income_floor".to_string(),
            description: "income floor".to_string(),
            severity: Severity::High,
            field: "monthly_income".to_string(),
            min: 1000.0,
        };
        assert_eq!(
            at_least.evaluate(&ctx(&[("monthly_income", json!(500.0))])),
            Ok(false)
        );
    }

    #[test]
    fn test_severity_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::from_str::<Severity>("\"critical\"").unwrap(),
            Severity::Critical
        );
    }
}
