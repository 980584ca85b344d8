//! Transaction types for hashledger

use crate::canonical::{format_float, json_float};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sender identifier used for mining reward transactions
pub const REWARD_SENDER: &str = "Blockchain";

/// Hex-encoded SHA-256 content fingerprint of a transaction
pub type TransactionId = String;

/// A value transfer between two opaque identifiers.
///
/// The id is a fingerprint of `(sender, recipient, amount, timestamp)`, so two
/// transactions with identical fields share an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    #[serde(with = "json_float")]
    pub amount: f64,
    #[serde(with = "json_float")]
    pub timestamp: f64,
    #[serde(rename = "transaction_id")]
    pub id: TransactionId,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
        timestamp: f64,
    ) -> Self {
        let sender = sender.into();
        let recipient = recipient.into();
        let id = Self::calculate_hash(&sender, &recipient, amount, timestamp);
        Transaction {
            sender,
            recipient,
            amount,
            timestamp,
            id,
        }
    }

    /// Mining reward paid by the system to `miner_address`
    pub fn reward(miner_address: impl Into<String>, amount: f64, timestamp: f64) -> Self {
        Self::new(REWARD_SENDER, miner_address, amount, timestamp)
    }

    /// Recompute the content hash from the current fields
    pub fn hash(&self) -> String {
        Self::calculate_hash(&self.sender, &self.recipient, self.amount, self.timestamp)
    }

    fn calculate_hash(sender: &str, recipient: &str, amount: f64, timestamp: f64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sender.as_bytes());
        hasher.update(recipient.as_bytes());
        hasher.update(format_float(amount).as_bytes());
        hasher.update(format_float(timestamp).as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn has_valid_id(&self) -> bool {
        self.id == self.hash()
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
