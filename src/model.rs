//! Rule-based mortgage risk model
//!
//! A deterministic bucketed scorer standing in for an upstream decision
//! model. Consumers feed its output to the orchestrator as the decision
//! under audit.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::orchestrator::DecisionInput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    pub decision: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

impl From<ModelOutput> for DecisionInput {
    fn from(output: ModelOutput) -> Self {
        DecisionInput {
            decision: output.decision,
            score: output.score,
            reasons: output.reasons,
        }
    }
}

fn field(context: &Map<String, Value>, name: &str, default: f64) -> f64 {
    context.get(name).and_then(Value::as_f64).unwrap_or(default)
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Score a mortgage application context.
pub fn mortgage_risk_model(context: &Map<String, Value>) -> ModelOutput {
    let loan_amount = field(context, "loan_amount", 0.0);
    let property_value = field(context, "property_value", 1.0);
    let monthly_debt = field(context, "monthly_debt", 0.0);
    let monthly_income = field(context, "monthly_income", 1.0);
    let marginal_var = field(context, "marginal_var", 0.0);
    let var_limit = field(context, "var_limit", 1.0);

    let ltv = safe_ratio(loan_amount, property_value).min(2.0);
    let dsr = safe_ratio(monthly_debt, monthly_income).min(2.0);
    let var_ratio = safe_ratio(marginal_var, var_limit).min(2.0);

    let mut buckets: Vec<(&str, f64)> = Vec::new();

    if ltv > 0.9 {
        buckets.push(("LTV > 90%", 0.45));
    } else if ltv > 0.8 {
        buckets.push(("LTV 80-90%", 0.35));
    } else if ltv > 0.7 {
        buckets.push(("LTV 70-80%", 0.25));
    } else {
        buckets.push(("LTV <= 70%", 0.15));
    }

    if dsr > 0.4 {
        buckets.push(("DSR > 40%", 0.35));
    } else if dsr > 0.35 {
        buckets.push(("DSR 35-40%", 0.3));
    } else if dsr > 0.25 {
        buckets.push(("DSR 25-35%", 0.2));
    } else {
        buckets.push(("DSR <= 25%", 0.1));
    }

    if var_ratio > 1.0 {
        buckets.push(("VaR ratio > 1.0", 0.25));
    } else if var_ratio > 0.8 {
        buckets.push(("VaR ratio 0.8-1.0", 0.2));
    } else {
        buckets.push(("VaR ratio <= 0.8", 0.1));
    }

    if monthly_income < 2500.0 {
        buckets.push(("Income < 2.5k", 0.15));
    } else if monthly_income < 3500.0 {
        buckets.push(("Income 2.5k-3.5k", 0.1));
    } else {
        buckets.push(("Income >= 3.5k", 0.05));
    }

    let raw: f64 = buckets.iter().map(|(_, weight)| weight).sum();
    let score = (raw.clamp(0.0, 1.5) * 1000.0).round() / 1000.0;

    let decision = if score < 0.6 {
        "APPROVE"
    } else if score < 0.85 {
        "REVIEW"
    } else {
        "REJECT"
    };

    ModelOutput {
        decision: decision.to_string(),
        score,
        reasons: buckets.iter().map(|(label, _)| label.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, f64)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_low_risk_application_approved() {
        let output = mortgage_risk_model(&ctx(&[
            ("loan_amount", 100_000.0),
            ("property_value", 200_000.0),
            ("monthly_debt", 500.0),
            ("monthly_income", 6_000.0),
            ("marginal_var", 0.5),
            ("var_limit", 1.0),
        ]));

        // 0.15 + 0.1 + 0.1 + 0.05
        assert_eq!(output.score, 0.4);
        assert_eq!(output.decision, "APPROVE");
        assert_eq!(output.reasons.len(), 4);
        assert!(output.reasons.contains(&"LTV <= 70%".to_string()));
    }

    #[test]
    fn test_high_risk_application_rejected() {
        let output = mortgage_risk_model(&ctx(&[
            ("loan_amount", 200_000.0),
            ("property_value", 210_000.0),
            ("monthly_debt", 3_000.0),
            ("monthly_income", 5_000.0),
            ("marginal_var", 1.5),
            ("var_limit", 1.0),
        ]));

        // 0.45 + 0.35 + 0.25 + 0.05
        assert_eq!(output.score, 1.1);
        assert_eq!(output.decision, "REJECT");
    }

    #[test]
    fn test_mid_risk_application_reviewed() {
        let output = mortgage_risk_model(&ctx(&[
            ("loan_amount", 170_000.0),
            ("property_value", 200_000.0), // LTV 0.85 -> 0.35
            ("monthly_debt", 1_900.0),
            ("monthly_income", 5_000.0), // DSR 0.38 -> 0.3
            ("marginal_var", 0.5),
            ("var_limit", 1.0), // -> 0.1
        ]));

        // 0.35 + 0.3 + 0.1 + 0.05 = 0.8
        assert_eq!(output.score, 0.8);
        assert_eq!(output.decision, "REVIEW");
    }

    #[test]
    fn test_zero_denominators_do_not_blow_up() {
        let output = mortgage_risk_model(&ctx(&[
            ("loan_amount", 100_000.0),
            ("property_value", 0.0),
            ("monthly_income", 0.0),
        ]));
        assert!(output.score.is_finite());
    }
}
