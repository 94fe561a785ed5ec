//! Audit orchestration pipeline
//!
//! One fixed pipeline per audited decision: constraints, drift, privacy
//! pre-check, outcome derivation, record assembly with conditional
//! redaction, ledger append, result bundle.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::AuditConfig;
use crate::crypto::{load_or_generate_key, CryptoProvider};
use crate::drift::{DriftDetector, DriftOutcome};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::policy::{PolicyConstraintEngine, ProfileRegistry, Violation};
use crate::privacy::{NoisyValue, PrivacyAccountant, PrivacyReport};

/// Final outcome when policy overrides a model approval.
pub const OUTCOME_BLOCKED: &str = "BLOCKED_BY_POLICY";
const DECISION_APPROVE: &str = "APPROVE";

/// Model decision fed into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionInput {
    pub decision: String,
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Constraint evaluation outcome for one decision.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintOutcome {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

/// Result bundle returned to the caller for each audited decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub audit_id: String,
    pub block_hash: String,
    pub decision: DecisionInput,
    pub final_outcome: String,
    pub constraints: ConstraintOutcome,
    pub drift: Option<DriftOutcome>,
    pub privacy: PrivacyReport,
}

/// Ledger-wide integrity report.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub chain_valid: bool,
    pub chain_errors: Vec<String>,
    pub chain_length: usize,
    pub total_decisions: u64,
    pub total_drift_events: u64,
    pub privacy: PrivacyReport,
    pub schema_version: String,
}

/// Composes ledger, policy engine, privacy accountant and drift detector
/// into the per-decision audit pipeline.
///
/// The pipeline is logically single-threaded per call; only the ledger is
/// internally synchronized. Concurrent callers must route through one
/// externally serialized orchestrator instance.
pub struct Orchestrator {
    config: AuditConfig,
    ledger: Ledger,
    policy: PolicyConstraintEngine,
    privacy: PrivacyAccountant,
    drift: DriftDetector,
    decisions: u64,
    drift_events: u64,
}

impl Orchestrator {
    /// Build an orchestrator from configuration alone.
    ///
    /// Uses the signing key file and ledger persistence when configured,
    /// the built-in `financial_basic` policy profile and the system clock.
    pub fn new(config: AuditConfig) -> Result<Self> {
        let policy = ProfileRegistry::with_builtin()
            .build("financial_basic")
            .unwrap_or_default();
        Self::with_components(config, policy, Arc::new(SystemClock))
    }

    /// Build an orchestrator with an explicit policy engine and clock.
    pub fn with_components(
        config: AuditConfig,
        policy: PolicyConstraintEngine,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let crypto = match &config.key_path {
            Some(path) => CryptoProvider::from_key(load_or_generate_key(path)?),
            None => CryptoProvider::generate(),
        };

        let ledger = match &config.ledger_path {
            Some(path) => Ledger::with_persistence(crypto, clock.clone(), path.clone())?,
            None => Ledger::new(crypto, clock.clone()),
        };

        let privacy = PrivacyAccountant::new(&config, clock.clone());
        let drift = DriftDetector::new(&config);

        Ok(Self {
            config,
            ledger,
            policy,
            privacy,
            drift,
            decisions: 0,
            drift_events: 0,
        })
    }

    /// Run the fixed audit pipeline for one decision.
    pub fn audit_decision(
        &mut self,
        decision: &DecisionInput,
        context: &Map<String, Value>,
    ) -> Result<AuditResult> {
        let audit_id = Uuid::new_v4().to_string();
        self.decisions += 1;

        // 1. Constraints.
        let violations = self.policy.check(context);

        // 2. Drift, when the context carries a feature vector.
        let drift_outcome = self.observe_features(context);

        // 3. Privacy pre-check; the spend happens only after assembly.
        let epsilon = self.config.epsilon_per_decision.max(1e-6);
        let can_log = self.privacy.can_query(epsilon);

        // 4. Final outcome: policy can only override approvals.
        let final_outcome = if decision.decision == DECISION_APPROVE && !violations.is_empty() {
            OUTCOME_BLOCKED.to_string()
        } else {
            decision.decision.clone()
        };

        // 5. Base audit record.
        let drift_flag = drift_outcome.as_ref().map(|o| o.drift).unwrap_or(false);
        let violation_ids: Vec<&str> = violations.iter().map(|v| v.id.as_str()).collect();

        let mut record = Map::new();
        record.insert("audit_id".to_string(), json!(audit_id));
        record.insert("model_decision".to_string(), json!(decision.decision));
        record.insert("model_score".to_string(), json!(decision.score));
        if !decision.reasons.is_empty() {
            record.insert("reasons".to_string(), json!(decision.reasons));
        }
        record.insert("violations".to_string(), json!(violations.len()));
        record.insert("violation_ids".to_string(), json!(violation_ids));
        record.insert("anomaly".to_string(), json!(drift_flag));
        record.insert("final_outcome".to_string(), json!(final_outcome));
        record.insert(
            "policy_blocked".to_string(),
            json!(final_outcome == OUTCOME_BLOCKED),
        );

        // 6. Spend and redact only if the pre-check passed.
        if can_log && self.privacy.spend(epsilon, "audit_log") {
            record.insert(
                "context".to_string(),
                Value::Object(self.redact_context(context)),
            );
        }

        // 7. Append.
        let block_hash = self.ledger.append(record)?;
        debug!("Audited decision {} -> {}", audit_id, final_outcome);

        // 8. Result bundle.
        Ok(AuditResult {
            audit_id,
            block_hash,
            decision: decision.clone(),
            final_outcome,
            constraints: ConstraintOutcome {
                passed: violations.is_empty(),
                violations,
            },
            drift: drift_outcome,
            privacy: self.privacy.report(),
        })
    }

    /// Feed the context's feature vector to the drift detector, if present.
    ///
    /// A malformed or wrong-length vector rejects only that observation.
    fn observe_features(&mut self, context: &Map<String, Value>) -> Option<DriftOutcome> {
        let value = context.get("features")?;
        let features = match as_feature_vector(value) {
            Some(features) => features,
            None => {
                warn!("Ignoring `features` field that is not a numeric array");
                return None;
            }
        };

        match self.drift.update(&features) {
            Ok(outcome) => {
                if outcome.drift {
                    self.drift_events += 1;
                }
                Some(outcome)
            }
            Err(e) => {
                warn!("Drift observation rejected: {}", e);
                None
            }
        }
    }

    /// Redact the context for persistence.
    ///
    /// Sensitive numeric fields are replaced with Laplace-noised values; a
    /// field whose noise query is denied is omitted. Raw feature vectors
    /// never reach the persisted payload.
    fn redact_context(&mut self, context: &Map<String, Value>) -> Map<String, Value> {
        let mut redacted = Map::new();

        for (key, value) in context {
            if key == "features" {
                continue;
            }

            let sensitive_number = if self.config.sensitive_fields.contains(key) {
                value.as_f64()
            } else {
                None
            };

            match sensitive_number {
                Some(number) => {
                    let noised = self.privacy.add_laplace_noise(
                        number,
                        self.config.privacy_sensitivity,
                        self.config.epsilon_per_decision,
                    );
                    if let NoisyValue::Noised(noisy) = noised {
                        redacted.insert(key.clone(), json!((noisy * 100.0).round() / 100.0));
                    }
                }
                None => {
                    redacted.insert(key.clone(), value.clone());
                }
            }
        }

        redacted
    }

    /// Verify the full chain and summarize pipeline counters.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let (chain_valid, chain_errors) = self.ledger.verify_integrity();
        IntegrityReport {
            chain_valid,
            chain_errors,
            chain_length: self.ledger.len(),
            total_decisions: self.decisions,
            total_drift_events: self.drift_events,
            privacy: self.privacy.report(),
            schema_version: self.config.schema_version.clone(),
        }
    }

    /// Read-only access to the underlying ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn privacy_report(&self) -> PrivacyReport {
        self.privacy.report()
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }
}

fn as_feature_vector(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
}
