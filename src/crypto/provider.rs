//! Keyed signing, verification and hashing
//!
//! One fixed 32-byte key secures an entire ledger instance; there is no
//! key rotation.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::crypto::keys::KEY_LEN;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer/verifier plus SHA-256 hashing.
pub struct CryptoProvider {
    key: [u8; KEY_LEN],
}

impl CryptoProvider {
    /// Create a provider with a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Create a provider from existing key material.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Sign a message, returning a 32-byte authentication tag.
    pub fn sign(&self, message: &[u8]) -> [u8; KEY_LEN] {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(message);

        let mut tag = [0u8; KEY_LEN];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        tag
    }

    /// Verify a tag against a message using a constant-time comparison.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(message);
        mac.verify_slice(tag).is_ok()
    }

    /// SHA-256 digest as 64 lowercase hex characters.
    pub fn hash_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

impl std::fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("CryptoProvider").finish_non_exhaustive()
    }
}
