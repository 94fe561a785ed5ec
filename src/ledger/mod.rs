//! Tamper-evident ledger
//!
//! Hash-chained, symmetric-key-signed append-only log. The chain is strictly
//! linear: each block commits to exactly one predecessor.

pub mod block;
pub mod chain;

pub use block::{canonical_json, LedgerBlock, GENESIS_PREV_HASH};
pub use chain::Ledger;
