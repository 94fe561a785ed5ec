//! Clock abstraction
//!
//! Block hashes commit to their timestamps, so production code uses wall-clock
//! time while tests inject a manual clock for byte-reproducible chains.

use chrono::Utc;
use std::sync::Mutex;

/// Source of epoch timestamps for ledger blocks and privacy query logs.
pub trait Clock: Send + Sync {
    /// Current time as seconds since the Unix epoch.
    fn now_epoch_secs(&self) -> f64;
}

/// Wall-clock time with microsecond resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Settable clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = secs;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) += secs;
    }
}

impl Clock for ManualClock {
    fn now_epoch_secs(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
