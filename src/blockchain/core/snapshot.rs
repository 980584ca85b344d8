use crate::canonical::json_float;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

use super::chain::{check_difficulty, Block};

/// Bulk interchange form of a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub difficulty: u32,
    #[serde(with = "json_float")]
    pub mining_reward: f64,
}

impl LedgerSnapshot {
    /// Parse a snapshot; any missing or mistyped field is a
    /// [`LedgerError::MalformedImport`].
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| LedgerError::MalformedImport(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Shape checks only; hashes and links are left to `validate`.
    pub fn check_structure(&self) -> Result<()> {
        if self.chain.is_empty() {
            return Err(LedgerError::MalformedImport(
                "chain must contain at least the genesis block".to_string(),
            ));
        }
        check_difficulty(self.difficulty).map_err(LedgerError::MalformedImport)?;
        Ok(())
    }
}
