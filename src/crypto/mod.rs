//! Cryptographic primitives for the audit ledger.
//!
//! Signing is symmetric (HMAC-SHA256): any holder of the key can forge
//! entries indistinguishable from genuine ones, so the ledger provides
//! integrity and authenticity but never non-repudiation.

pub mod keys;
pub mod provider;

pub use keys::{load_or_generate_key, KEY_LEN};
pub use provider::CryptoProvider;
