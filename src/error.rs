//! Error types for hashledger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Mining was requested while the pending pool holds nothing to mine.
    #[error("No pending transactions to mine")]
    EmptyPendingPool,
    #[error("Malformed import: {0}")]
    MalformedImport(String),
    /// The chain tip moved while a block was being mined against it.
    /// Only used between the miner and the shared ledger, which retries.
    #[error("Chain tip advanced during mining")]
    StaleTip,
    #[error("Mining cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
