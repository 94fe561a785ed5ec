//! Append-only hash chain with optional durable persistence
//!
//! Every mutating or chain-reading operation is serialized under one mutex
//! scoped to the ledger instance; append plus persistence is atomic with
//! respect to concurrent audit calls.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::crypto::CryptoProvider;
use crate::error::{AuditError, Result};
use crate::ledger::block::{LedgerBlock, GENESIS_PREV_HASH};

/// On-disk chain document: `{"chain": [block, ...]}`.
#[derive(Serialize, Deserialize)]
struct ChainFile {
    chain: Vec<LedgerBlock>,
}

/// Tamper-evident append-only log.
pub struct Ledger {
    crypto: CryptoProvider,
    clock: Arc<dyn Clock>,
    persist_path: Option<PathBuf>,
    chain: Mutex<Vec<LedgerBlock>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("persist_path", &self.persist_path)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create an in-memory ledger with a fresh genesis block.
    pub fn new(crypto: CryptoProvider, clock: Arc<dyn Clock>) -> Self {
        let genesis = Self::genesis_block(&crypto, clock.as_ref());
        Self {
            crypto,
            clock,
            persist_path: None,
            chain: Mutex::new(vec![genesis]),
        }
    }

    /// Create a persistent ledger.
    ///
    /// If `path` exists the entire chain is deserialized and fully verified
    /// before the ledger starts; any discrepancy is fatal. Otherwise a new
    /// chain with a genesis block is created and written out.
    pub fn with_persistence(
        crypto: CryptoProvider,
        clock: Arc<dyn Clock>,
        path: PathBuf,
    ) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: ChainFile = serde_json::from_str(&content).map_err(|e| {
                AuditError::ChainError(format!(
                    "Failed to parse persisted chain {}: {}",
                    path.display(),
                    e
                ))
            })?;

            if file.chain.is_empty() {
                return Err(AuditError::ChainError(format!(
                    "Persisted chain {} is empty",
                    path.display()
                )));
            }

            let errors = verify_blocks(&crypto, &file.chain);
            if !errors.is_empty() {
                return Err(AuditError::ChainError(format!(
                    "Persisted chain {} failed verification: {}",
                    path.display(),
                    errors.join("; ")
                )));
            }

            info!(
                "Loaded and verified {} blocks from {}",
                file.chain.len(),
                path.display()
            );
            return Ok(Self {
                crypto,
                clock,
                persist_path: Some(path),
                chain: Mutex::new(file.chain),
            });
        }

        let genesis = Self::genesis_block(&crypto, clock.as_ref());
        let ledger = Self {
            crypto,
            clock,
            persist_path: Some(path),
            chain: Mutex::new(vec![genesis]),
        };
        {
            let chain = ledger.lock_chain();
            ledger.persist_locked(&chain)?;
        }
        Ok(ledger)
    }

    fn genesis_block(crypto: &CryptoProvider, clock: &dyn Clock) -> LedgerBlock {
        let timestamp = clock.now_epoch_secs();
        let mut data = Map::new();
        data.insert("type".to_string(), json!("genesis"));
        data.insert("timestamp".to_string(), json!(timestamp));
        LedgerBlock::new(crypto, 0, timestamp, data, GENESIS_PREV_HASH.to_string())
    }

    fn lock_chain(&self) -> MutexGuard<'_, Vec<LedgerBlock>> {
        self.chain.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a payload as a new signed block; returns the block hash.
    pub fn append(&self, data: Map<String, Value>) -> Result<String> {
        let mut chain = self.lock_chain();

        let prev_hash = chain
            .last()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| GENESIS_PREV_HASH.to_string());
        let index = chain.len() as u64;
        let timestamp = self.clock.now_epoch_secs();

        let block = LedgerBlock::new(&self.crypto, index, timestamp, data, prev_hash);
        let hash = block.hash.clone();

        chain.push(block);
        if self.persist_path.is_some() {
            if let Err(e) = self.persist_locked(&chain) {
                chain.pop();
                return Err(e);
            }
        }

        debug!("Appended block {} ({})", index, hash);
        Ok(hash)
    }

    /// Write the full chain atomically: temp file, then rename.
    fn persist_locked(&self, chain: &[LedgerBlock]) -> Result<()> {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let file_name = path.file_name().ok_or_else(|| {
            AuditError::PersistenceError(format!("Invalid ledger path {}", path.display()))
        })?;
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        let document = serde_json::to_string_pretty(&ChainFile {
            chain: chain.to_vec(),
        })?;
        std::fs::write(&tmp_path, document)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Recompute every hash, re-verify every signature, re-check every link.
    ///
    /// Returns all discrepancies rather than stopping at the first; the
    /// ledger never auto-repairs a tampered chain.
    pub fn verify_integrity(&self) -> (bool, Vec<String>) {
        let chain = self.lock_chain();
        let errors = verify_blocks(&self.crypto, &chain);
        (errors.is_empty(), errors)
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.lock_chain().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_chain().is_empty()
    }

    /// Read-only snapshot of the block sequence.
    pub fn blocks(&self) -> Vec<LedgerBlock> {
        self.lock_chain().clone()
    }
}

fn verify_blocks(crypto: &CryptoProvider, chain: &[LedgerBlock]) -> Vec<String> {
    let mut errors = Vec::new();

    for (i, block) in chain.iter().enumerate() {
        if !block.verify_hash() {
            errors.push(format!("Block {}: hash mismatch", i));
        }
        if !block.verify_signature(crypto) {
            errors.push(format!("Block {}: invalid signature", i));
        }
        if i == 0 {
            if block.prev_hash != GENESIS_PREV_HASH {
                errors.push("Block 0: genesis prev_hash is not all-zero".to_string());
            }
        } else if block.prev_hash != chain[i - 1].hash {
            errors.push(format!("Block {}: broken chain link", i));
        }
    }

    errors
}
