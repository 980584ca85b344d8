//! FIFO pool of submitted transactions waiting to be mined

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Mempool { transactions }
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Pending transactions in submission order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Remove the `count` oldest transactions.
    ///
    /// Mining always takes a prefix of the pool, so anything submitted after
    /// the snapshot was taken stays pending.
    pub fn drain_front(&mut self, count: usize) -> Vec<Transaction> {
        let count = count.min(self.transactions.len());
        self.transactions.drain(..count).collect()
    }

    /// Whether the oldest transactions are exactly `expected`, in order
    pub fn starts_with(&self, expected: &[Transaction]) -> bool {
        self.transactions.len() >= expected.len()
            && self
                .transactions
                .iter()
                .zip(expected)
                .all(|(a, b)| a.id == b.id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
