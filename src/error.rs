use thiserror::Error;

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::PersistenceError(format!("I/O error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Key file error: {0}")]
    KeyFileError(String),

    #[error("Ledger corruption: {0}")]
    ChainError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Rule set error: {0}")]
    RuleSetError(String),

    #[error("Replay error: {0}")]
    ReplayError(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
