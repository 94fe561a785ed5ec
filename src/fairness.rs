//! Fairness aggregation over the audit ledger
//!
//! Per-group approval-rate statistics computed from the ledger's read-only
//! block sequence. Purely informational; never feeds back into decisions.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ledger::LedgerBlock;
use crate::orchestrator::OUTCOME_BLOCKED;

#[derive(Debug, Clone, Serialize)]
pub struct GroupMetrics {
    pub count: u64,
    pub model_approval_rate: f64,
    pub final_approval_rate: f64,
    pub policy_override_rate: f64,
    pub avg_model_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FairnessReport {
    pub attribute: String,
    pub groups: BTreeMap<String, GroupMetrics>,
    /// Max minus min final approval rate across groups.
    pub approval_span: f64,
}

#[derive(Default)]
struct GroupTally {
    count: u64,
    model_approvals: u64,
    final_approvals: u64,
    policy_blocks: u64,
    score_sum: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Group attribute lookup: top-level record field first, then the redacted
/// context. Records without the attribute (the genesis block included) are
/// skipped.
fn group_of(block: &LedgerBlock, attribute: &str) -> Option<String> {
    if let Some(group) = block.data.get(attribute).and_then(Value::as_str) {
        return Some(group.to_string());
    }
    block
        .data
        .get("context")?
        .as_object()?
        .get(attribute)?
        .as_str()
        .map(str::to_string)
}

/// Compute per-group approval statistics for one grouping attribute.
pub fn compute_group_metrics<'a, I>(blocks: I, attribute: &str) -> FairnessReport
where
    I: IntoIterator<Item = &'a LedgerBlock>,
{
    let mut tallies: BTreeMap<String, GroupTally> = BTreeMap::new();

    for block in blocks {
        let group = match group_of(block, attribute) {
            Some(group) => group,
            None => continue,
        };
        let tally = tallies.entry(group).or_default();
        let data = &block.data;

        tally.count += 1;
        if data.get("model_decision").and_then(Value::as_str) == Some("APPROVE") {
            tally.model_approvals += 1;
        }
        if data.get("final_outcome").and_then(Value::as_str) == Some("APPROVE") {
            tally.final_approvals += 1;
        }
        if data.get("final_outcome").and_then(Value::as_str) == Some(OUTCOME_BLOCKED)
            || data.get("policy_blocked").and_then(Value::as_bool) == Some(true)
        {
            tally.policy_blocks += 1;
        }
        if let Some(score) = data.get("model_score").and_then(Value::as_f64) {
            tally.score_sum += score;
        }
    }

    let mut groups = BTreeMap::new();
    for (name, tally) in tallies {
        if tally.count == 0 {
            continue;
        }
        let count = tally.count as f64;
        groups.insert(
            name,
            GroupMetrics {
                count: tally.count,
                model_approval_rate: round4(tally.model_approvals as f64 / count),
                final_approval_rate: round4(tally.final_approvals as f64 / count),
                policy_override_rate: round4(tally.policy_blocks as f64 / count),
                avg_model_score: round4(tally.score_sum / count),
            },
        );
    }

    let rates: Vec<f64> = groups.values().map(|g| g.final_approval_rate).collect();
    let approval_span = if rates.is_empty() {
        0.0
    } else {
        let min = rates.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        round4(max - min)
    };

    FairnessReport {
        attribute: attribute.to_string(),
        groups,
        approval_span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record_block(segment: &str, model: &str, outcome: &str, score: f64) -> LedgerBlock {
        let mut data = Map::new();
        data.insert("segment".to_string(), json!(segment));
        data.insert("model_decision".to_string(), json!(model));
        data.insert("final_outcome".to_string(), json!(outcome));
        data.insert(
            "policy_blocked".to_string(),
            json!(outcome == OUTCOME_BLOCKED),
        );
        data.insert("model_score".to_string(), json!(score));

        LedgerBlock {
            index: 0,
            timestamp: 0.0,
            data,
            prev_hash: String::new(),
            hash: String::new(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_all_approved_group_has_rate_one() {
        let blocks = vec![
            record_block("north", "APPROVE", "APPROVE", 0.2),
            record_block("north", "APPROVE", "APPROVE", 0.4),
        ];
        let report = compute_group_metrics(&blocks, "segment");

        let north = &report.groups["north"];
        assert_eq!(north.count, 2);
        assert_eq!(north.model_approval_rate, 1.0);
        assert_eq!(north.final_approval_rate, 1.0);
        assert_eq!(north.policy_override_rate, 0.0);
        assert_eq!(north.avg_model_score, 0.3);
    }

    #[test]
    fn test_approval_span_across_groups() {
        let blocks = vec![
            record_block("north", "APPROVE", "APPROVE", 0.2),
            record_block("south", "APPROVE", OUTCOME_BLOCKED, 0.5),
            record_block("south", "APPROVE", "APPROVE", 0.3),
        ];
        let report = compute_group_metrics(&blocks, "segment");

        assert_eq!(report.groups["north"].final_approval_rate, 1.0);
        assert_eq!(report.groups["south"].final_approval_rate, 0.5);
        assert_eq!(report.groups["south"].policy_override_rate, 0.5);
        assert_eq!(report.approval_span, 0.5);
    }

    #[test]
    fn test_blocks_without_attribute_skipped() {
        let mut genesis_data = Map::new();
        genesis_data.insert("type".to_string(), json!("genesis"));
        let genesis = LedgerBlock {
            index: 0,
            timestamp: 0.0,
            data: genesis_data,
            prev_hash: String::new(),
            hash: String::new(),
            signature: String::new(),
        };

        let blocks = vec![genesis, record_block("north", "REJECT", "REJECT", 1.0)];
        let report = compute_group_metrics(&blocks, "segment");

        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups["north"].final_approval_rate, 0.0);
    }

    #[test]
    fn test_attribute_found_inside_redacted_context() {
        let mut data = Map::new();
        data.insert("model_decision".to_string(), json!("APPROVE"));
        data.insert("final_outcome".to_string(), json!("APPROVE"));
        data.insert("model_score".to_string(), json!(0.1));
        data.insert("context".to_string(), json!({"segment": "west"}));
        let block = LedgerBlock {
            index: 0,
            timestamp: 0.0,
            data,
            prev_hash: String::new(),
            hash: String::new(),
            signature: String::new(),
        };

        let report = compute_group_metrics(std::iter::once(&block), "segment");
        assert_eq!(report.groups["west"].count, 1);
    }

    #[test]
    fn test_empty_ledger_reports_zero_span() {
        let report = compute_group_metrics(std::iter::empty(), "segment");
        assert!(report.groups.is_empty());
        assert_eq!(report.approval_span, 0.0);
    }
}
