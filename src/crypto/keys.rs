//! Signing-key file management
//!
//! The key file holds exactly 32 raw bytes. A fresh key is generated with
//! owner-only permissions; loading a file of any other length is fatal.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::error::{AuditError, Result};

pub const KEY_LEN: usize = 32;

/// Load the signing key from `path`, generating one if the file is missing.
pub fn load_or_generate_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    if path.exists() {
        let bytes = std::fs::read(path)
            .map_err(|e| AuditError::KeyFileError(format!("Failed to read {}: {}", path.display(), e)))?;

        if bytes.len() != KEY_LEN {
            return Err(AuditError::KeyFileError(format!(
                "{} holds {} bytes, expected exactly {}",
                path.display(),
                bytes.len(),
                KEY_LEN
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| AuditError::KeyFileError(format!("Failed to create {}: {}", path.display(), e)))?;
    file.write_all(&key)
        .map_err(|e| AuditError::KeyFileError(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Generated new signing key at {}", path.display());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_then_load_same_key() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ledger.key");

        let generated = load_or_generate_key(&path).unwrap();
        let loaded = load_or_generate_key(&path).unwrap();
        assert_eq!(generated, loaded);
    }

    #[test]
    fn test_wrong_length_is_fatal() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("short.key");
        std::fs::write(&path, [1u8; 16]).unwrap();

        let err = load_or_generate_key(&path).unwrap_err();
        assert!(matches!(err, AuditError::KeyFileError(_)));
        assert!(err.to_string().contains("16 bytes"));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let path = tmp.path().join("perm.key");
        load_or_generate_key(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
