use crate::transaction::Transaction;
use std::collections::HashMap;

use super::chain::Block;

/// Incrementally maintained view of the chain: running balance per address
/// and the location of every transaction id.
///
/// Only the append and import transitions of the ledger update it, and
/// transactions are applied in chain order, so every balance accumulates in
/// exactly the same order a full replay would.
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    address_balances: HashMap<String, f64>,
    // id -> (block position, position within block), first occurrence wins
    tx_locations: HashMap<String, (usize, usize)>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(blocks: &[Block]) -> Self {
        let mut index = Self::new();
        for (position, block) in blocks.iter().enumerate() {
            index.apply_block(position, block);
        }
        index
    }

    pub fn apply_block(&mut self, position: usize, block: &Block) {
        for (i, tx) in block.transactions.iter().enumerate() {
            self.apply_transaction(tx);
            self.tx_locations
                .entry(tx.id.clone())
                .or_insert((position, i));
        }
    }

    fn apply_transaction(&mut self, tx: &Transaction) {
        *self
            .address_balances
            .entry(tx.sender.clone())
            .or_insert(0.0) -= tx.amount;
        *self
            .address_balances
            .entry(tx.recipient.clone())
            .or_insert(0.0) += tx.amount;
    }

    pub fn get_balance(&self, address: &str) -> f64 {
        self.address_balances.get(address).copied().unwrap_or(0.0)
    }

    pub fn locate(&self, id: &str) -> Option<(usize, usize)> {
        self.tx_locations.get(id).copied()
    }
}
