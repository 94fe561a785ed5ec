//! CSV batch replay
//!
//! Feeds historical decision contexts through the audit pipeline, one
//! `audit_decision` call per record. The risk model supplies the decision
//! for each row.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::info;

use crate::error::{AuditError, Result};
use crate::model::mortgage_risk_model;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Serialize)]
pub struct ReplayRecord {
    pub row: usize,
    pub audit_id: String,
    pub decision: String,
    pub final_outcome: String,
    pub constraints_passed: bool,
    pub block_hash: String,
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub rows: usize,
    pub approved: usize,
    pub blocked: usize,
    pub records: Vec<ReplayRecord>,
}

/// Build an audit context from one CSV row.
///
/// Numeric columns parse to numbers and double as the drift feature vector
/// (in column order); everything else passes through as a string.
fn row_to_context(headers: &csv::StringRecord, row: &csv::StringRecord) -> Map<String, Value> {
    let mut context = Map::new();
    let mut features = Vec::new();

    for (header, raw) in headers.iter().zip(row.iter()) {
        match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => {
                context.insert(header.to_string(), json!(number));
                features.push(number);
            }
            _ => {
                context.insert(header.to_string(), json!(raw));
            }
        }
    }

    if !features.is_empty() {
        context.insert("features".to_string(), json!(features));
    }
    context
}

/// Replay a CSV file of decision contexts through the orchestrator.
pub fn replay_csv<P: AsRef<Path>>(
    orchestrator: &mut Orchestrator,
    path: P,
) -> Result<ReplaySummary> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AuditError::ReplayError(format!("Failed to open {}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| AuditError::ReplayError(format!("Failed to read headers: {}", e)))?
        .clone();

    let mut records = Vec::new();
    let mut approved = 0;
    let mut blocked = 0;

    for (i, row) in reader.records().enumerate() {
        let row = row
            .map_err(|e| AuditError::ReplayError(format!("Failed to read row {}: {}", i + 1, e)))?;

        let context = row_to_context(&headers, &row);
        let decision = mortgage_risk_model(&context).into();
        let result = orchestrator.audit_decision(&decision, &context)?;

        match result.final_outcome.as_str() {
            "APPROVE" => approved += 1,
            "BLOCKED_BY_POLICY" => blocked += 1,
            _ => {}
        }

        records.push(ReplayRecord {
            row: i + 1,
            audit_id: result.audit_id,
            decision: result.decision.decision,
            final_outcome: result.final_outcome,
            constraints_passed: result.constraints.passed,
            block_hash: result.block_hash,
        });
    }

    info!("Replayed {} records from {}", records.len(), path.display());
    Ok(ReplaySummary {
        rows: records.len(),
        approved,
        blocked,
        records,
    })
}
