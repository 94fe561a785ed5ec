//! Differential-privacy budget accounting
//!
//! One global epsilon budget shared by every query in a session, with Laplace
//! noise as the single mechanism. Budget exhaustion is not an error: a denied
//! spend silently omits the sensitive payload while the audit continues.

use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::config::AuditConfig;

/// Category under which the Laplace mechanism spends budget.
pub const LAPLACE_CATEGORY: &str = "laplace_query";

/// One entry in the ordered query log.
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
    pub timestamp: f64,
    pub category: String,
    pub epsilon: f64,
    pub total_spent: f64,
}

/// Snapshot of the budget state.
#[derive(Debug, Clone, Serialize)]
pub struct PrivacyReport {
    pub total_budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub by_category: BTreeMap<String, f64>,
    pub queries: usize,
}

/// Result of a noised query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoisyValue {
    Noised(f64),
    /// The budget denied the spend; no noise was drawn.
    Exhausted,
}

/// Epsilon-budget accountant with Laplace noise injection.
///
/// Not internally synchronized; concurrent callers must serialize access
/// externally (the orchestrator owns one accountant per pipeline).
pub struct PrivacyAccountant {
    max_epsilon: f64,
    spent_epsilon: f64,
    amount_min: f64,
    amount_max: f64,
    by_category: BTreeMap<String, f64>,
    query_log: Vec<QueryLogEntry>,
    clock: Arc<dyn Clock>,
}

impl PrivacyAccountant {
    pub fn new(config: &AuditConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_epsilon: config.max_epsilon,
            spent_epsilon: 0.0,
            amount_min: config.amount_min,
            amount_max: config.amount_max,
            by_category: BTreeMap::new(),
            query_log: Vec::new(),
            clock,
        }
    }

    /// Pure budget check; never mutates.
    pub fn can_query(&self, epsilon_cost: f64) -> bool {
        self.spent_epsilon + epsilon_cost <= self.max_epsilon
    }

    /// Spend budget atomically: state and log change only if allowed.
    pub fn spend(&mut self, epsilon_cost: f64, category: &str) -> bool {
        if !self.can_query(epsilon_cost) {
            debug!(
                "Denied spend of {}ε for {} ({}/{} spent)",
                epsilon_cost, category, self.spent_epsilon, self.max_epsilon
            );
            return false;
        }

        self.spent_epsilon += epsilon_cost;
        *self.by_category.entry(category.to_string()).or_insert(0.0) += epsilon_cost;
        self.query_log.push(QueryLogEntry {
            timestamp: self.clock.now_epoch_secs(),
            category: category.to_string(),
            epsilon: epsilon_cost,
            total_spent: self.spent_epsilon,
        });
        true
    }

    pub fn remaining_budget(&self) -> f64 {
        (self.max_epsilon - self.spent_epsilon).max(0.0)
    }

    /// Add Laplace noise with scale `sensitivity / epsilon` to `value`.
    ///
    /// Spends `epsilon` first; on denial returns [`NoisyValue::Exhausted`]
    /// without drawing noise. The noised result is clamped into the
    /// configured amount bounds. The uniform sample comes from the OS
    /// entropy source.
    pub fn add_laplace_noise(
        &mut self,
        value: f64,
        sensitivity: f64,
        epsilon: f64,
    ) -> NoisyValue {
        if !self.spend(epsilon, LAPLACE_CATEGORY) {
            return NoisyValue::Exhausted;
        }

        let scale = sensitivity / epsilon;
        let u: f64 = OsRng.gen::<f64>() - 0.5;
        // Inverse-CDF sampling; the magnitude floor keeps ln() finite at the
        // u = -0.5 edge of the uniform range.
        let magnitude = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
        let noise = -scale * u.signum() * magnitude.ln();

        NoisyValue::Noised((value + noise).clamp(self.amount_min, self.amount_max))
    }

    pub fn report(&self) -> PrivacyReport {
        PrivacyReport {
            total_budget: self.max_epsilon,
            spent: self.spent_epsilon,
            remaining: self.remaining_budget(),
            by_category: self.by_category.clone(),
            queries: self.query_log.len(),
        }
    }

    /// Ordered log of every granted query.
    pub fn query_log(&self) -> &[QueryLogEntry] {
        &self.query_log
    }
}
