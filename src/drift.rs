//! Windowed drift detection
//!
//! Diagonal approximation of a multivariate shift statistic over two bounded
//! FIFO windows. Feature independence is assumed; no cross-covariance.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

use crate::config::AuditConfig;
use crate::error::{AuditError, Result};

/// Outcome of one observation.
#[derive(Debug, Clone, Serialize)]
pub struct DriftOutcome {
    pub drift: bool,
    pub score: f64,
    pub threshold: f64,
    /// Reference window still below capacity; no scoring yet.
    pub filling_reference: bool,
    /// Test window below the minimum sample count; scoring deferred.
    pub filling_test: bool,
    pub reference_len: usize,
    pub test_len: usize,
}

impl DriftOutcome {
    fn filling(reference: bool, threshold: f64, reference_len: usize, test_len: usize) -> Self {
        Self {
            drift: false,
            score: 0.0,
            threshold,
            filling_reference: reference,
            filling_test: !reference,
            reference_len,
            test_len,
        }
    }
}

/// Detects distribution shift between a reference window and a test window.
///
/// The first observation fixes the feature-vector dimensionality. Drift is
/// flagged once the score exceeds the threshold with at least
/// `min_test_samples` test observations; on a flagged drift with a *full*
/// test window the reference window is replaced by the test window's
/// contents and the test window is cleared, so subsequent drift events
/// require the test window to refill.
pub struct DriftDetector {
    window_size: usize,
    threshold: f64,
    min_test_samples: usize,
    reference: VecDeque<Vec<f64>>,
    test: VecDeque<Vec<f64>>,
    n_features: Option<usize>,
    scores: Vec<f64>,
}

impl DriftDetector {
    pub fn new(config: &AuditConfig) -> Self {
        Self::with_params(
            config.drift_window_size,
            config.drift_threshold,
            config.min_test_samples,
        )
    }

    pub fn with_params(window_size: usize, threshold: f64, min_test_samples: usize) -> Self {
        Self {
            window_size,
            threshold,
            min_test_samples: min_test_samples.max(1),
            reference: VecDeque::with_capacity(window_size),
            test: VecDeque::with_capacity(window_size),
            n_features: None,
            scores: Vec::new(),
        }
    }

    /// Feed one observation.
    ///
    /// A wrong-length observation is rejected without mutating any state.
    pub fn update(&mut self, observation: &[f64]) -> Result<DriftOutcome> {
        match self.n_features {
            None => self.n_features = Some(observation.len()),
            Some(expected) if observation.len() != expected => {
                return Err(AuditError::DimensionMismatch {
                    expected,
                    actual: observation.len(),
                });
            }
            Some(_) => {}
        }

        if self.reference.len() < self.window_size {
            self.reference.push_back(observation.to_vec());
            return Ok(DriftOutcome::filling(
                true,
                self.threshold,
                self.reference.len(),
                self.test.len(),
            ));
        }

        self.test.push_back(observation.to_vec());
        if self.test.len() > self.window_size {
            self.test.pop_front();
        }

        if self.test.len() < self.min_test_samples {
            return Ok(DriftOutcome::filling(
                false,
                self.threshold,
                self.reference.len(),
                self.test.len(),
            ));
        }

        let score = self.score_windows();
        self.scores.push(score);
        let drift = score > self.threshold;

        if drift && self.test.len() >= self.window_size {
            // Adaptive re-baselining: the shifted batch becomes the new normal.
            info!("Drift detected (score {:.3}), re-baselining reference window", score);
            std::mem::swap(&mut self.reference, &mut self.test);
            self.test.clear();
        }

        Ok(DriftOutcome {
            drift,
            score,
            threshold: self.threshold,
            filling_reference: false,
            filling_test: false,
            reference_len: self.reference.len(),
            test_len: self.test.len(),
        })
    }

    /// Squared standardized mean differences, averaged over features.
    fn score_windows(&self) -> f64 {
        let n_features = match self.n_features {
            Some(n) if n > 0 => n,
            _ => return 0.0,
        };

        let mut accumulated = 0.0;
        for i in 0..n_features {
            let ref_values: Vec<f64> = self.reference.iter().map(|v| v[i]).collect();
            let test_values: Vec<f64> = self.test.iter().map(|v| v[i]).collect();

            let ref_mean = mean(&ref_values);
            let test_mean = mean(&test_values);
            let ref_var = variance(&ref_values, ref_mean);

            if ref_var > 0.0 {
                let diff = test_mean - ref_mean;
                accumulated += diff * diff / ref_var;
            }
        }

        (accumulated / n_features as f64).sqrt()
    }

    /// Every score computed so far, in order.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected sample variance; the divisor is floored at 1.
fn variance(values: &[f64], mean: f64) -> f64 {
    let divisor = values.len().saturating_sub(1).max(1) as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: usize = 10;

    fn detector() -> DriftDetector {
        DriftDetector::with_params(W, 3.0, 3)
    }

    /// Reference observations around the given center with a little spread.
    fn baseline(center: f64, i: usize) -> Vec<f64> {
        let wobble = if i % 2 == 0 { 1.0 } else { -1.0 };
        vec![center + wobble, center * 2.0 + wobble]
    }

    #[test]
    fn test_reference_fills_first() {
        let mut det = detector();
        for i in 0..W {
            let outcome = det.update(&baseline(100.0, i)).unwrap();
            assert!(outcome.filling_reference);
            assert!(!outcome.drift);
            assert_eq!(outcome.reference_len, i + 1);
        }
    }

    #[test]
    fn test_test_window_defers_scoring() {
        let mut det = detector();
        for i in 0..W {
            det.update(&baseline(100.0, i)).unwrap();
        }

        let outcome = det.update(&baseline(100.0, 0)).unwrap();
        assert!(outcome.filling_test);
        assert_eq!(outcome.test_len, 1);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected_without_mutation() {
        let mut det = detector();
        det.update(&[1.0, 2.0]).unwrap();

        let err = det.update(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            AuditError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        // State unchanged: the next well-formed observation is accepted.
        let outcome = det.update(&[3.0, 4.0]).unwrap();
        assert_eq!(outcome.reference_len, 2);
    }

    #[test]
    fn test_shifted_batch_triggers_drift_at_min_samples() {
        let mut det = detector();
        for i in 0..W {
            det.update(&baseline(100.0, i)).unwrap();
        }

        // Means shifted by many reference standard deviations.
        let mut drift_at = None;
        for i in 0..3 {
            let outcome = det.update(&baseline(200.0, i)).unwrap();
            if outcome.drift {
                drift_at = Some(i + 1);
            }
        }
        assert_eq!(drift_at, Some(3), "drift should fire at min_test_samples");
    }

    #[test]
    fn test_rebaseline_on_full_test_window() {
        let mut det = detector();
        for i in 0..W {
            det.update(&baseline(100.0, i)).unwrap();
        }

        let mut last = None;
        for i in 0..W {
            last = Some(det.update(&baseline(200.0, i)).unwrap());
        }
        let last = last.unwrap();

        // The final shifted observation filled the test window, so the
        // reference was replaced and the test window cleared.
        assert!(last.drift);
        assert_eq!(last.reference_len, W);
        assert_eq!(last.test_len, 0);

        // The shifted batch is the new baseline: same-distribution
        // observations no longer score as drift once the window refills.
        for i in 0..3 {
            let outcome = det.update(&baseline(200.0, i)).unwrap();
            assert!(!outcome.drift, "unexpected drift after re-baseline");
        }
    }

    #[test]
    fn test_zero_variance_features_contribute_nothing() {
        let mut det = DriftDetector::with_params(4, 3.0, 2);
        // Constant feature everywhere.
        for _ in 0..4 {
            det.update(&[5.0]).unwrap();
        }
        for _ in 0..2 {
            let outcome = det.update(&[500.0]).unwrap();
            assert_eq!(outcome.score, 0.0);
            assert!(!outcome.drift);
        }
    }

    #[test]
    fn test_scores_accumulate() {
        let mut det = detector();
        for i in 0..W {
            det.update(&baseline(100.0, i)).unwrap();
        }
        for i in 0..5 {
            det.update(&baseline(100.0, i)).unwrap();
        }
        // Scoring started once the test window held min_test_samples.
        assert_eq!(det.scores().len(), 3);
    }
}
