//! Declarative policy constraint engine
//!
//! Rules are data: a tagged variant per rule kind, dispatched through a
//! single evaluation function. No executable code is ever built from a
//! rule specification.

pub mod engine;
pub mod loader;
pub mod rules;

pub use engine::{PolicyConstraintEngine, ProfileRegistry};
pub use loader::{load_rule_set, parse_rule_set};
pub use rules::{RuleSpec, Severity, Violation};
