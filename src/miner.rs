//! Proof-of-work mining
//!
//! Turns a snapshot of the pending pool into a sealed block. The miner never
//! touches ledger state: committing the block is the caller's job, which is
//! what lets the shared ledger run the search outside its lock.

use crate::blockchain::Block;
use crate::error::Result;
use crate::transaction::{now_timestamp, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default number of nonces tried between cancellation checks
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Cooperative cancellation for a running search.
///
/// Clones share the same flag. A child token also observes its parent's
/// flag, so cancelling the parent stops every search derived from it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        CancelToken {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A fresh token that is also cancelled when `self` is
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(self.flag.clone()),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::Relaxed))
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Everything needed to mine the next block, cut from the ledger at one
/// point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningJob {
    /// Pending transactions, oldest first
    pub transactions: Vec<Transaction>,
    pub miner_address: String,
    pub reward: f64,
    pub previous_hash: String,
    pub index: u64,
    pub difficulty: u32,
    /// Import epoch of the ledger the job was cut from
    pub epoch: u64,
}

impl MiningJob {
    pub fn new(
        pending: &[Transaction],
        miner_address: &str,
        reward: f64,
        chain_tip: &Block,
        next_index: u64,
        difficulty: u32,
    ) -> Self {
        MiningJob {
            transactions: pending.to_vec(),
            miner_address: miner_address.to_string(),
            reward,
            previous_hash: chain_tip.hash.clone(),
            index: next_index,
            difficulty,
            epoch: 0,
        }
    }

    /// Unsealed block: the pending transactions followed by the reward.
    pub fn candidate(&self) -> Block {
        let timestamp = now_timestamp();
        let mut transactions = self.transactions.clone();
        transactions.push(Transaction::reward(
            self.miner_address.clone(),
            self.reward,
            timestamp,
        ));
        Block::new(self.index, timestamp, transactions, self.previous_hash.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningStats {
    pub attempts: u64,
    pub elapsed: Duration,
}

impl MiningStats {
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

/// Build and seal the next block on top of `chain_tip`. Blocks the calling
/// thread until a valid nonce is found.
pub fn mine(
    pending: &[Transaction],
    miner_address: &str,
    reward_amount: f64,
    chain_tip: &Block,
    next_index: u64,
    difficulty: u32,
) -> Block {
    let job = MiningJob::new(
        pending,
        miner_address,
        reward_amount,
        chain_tip,
        next_index,
        difficulty,
    );
    mine_job(&job)
}

pub fn mine_job(job: &MiningJob) -> Block {
    let mut block = job.candidate();
    block.seal(job.difficulty);
    info!(index = block.index, nonce = block.nonce, hash = %block.hash, "Block sealed");
    block
}

/// Seal `job`'s candidate, checking `cancel` every `check_interval` nonces.
pub fn mine_cancellable(
    job: &MiningJob,
    cancel: &CancelToken,
    check_interval: u64,
) -> Result<(Block, MiningStats)> {
    let start = Instant::now();
    let mut block = job.candidate();

    let attempts = match block.seal_cancellable(job.difficulty, cancel, check_interval) {
        Ok(attempts) => attempts,
        Err(e) => {
            debug!(
                index = job.index,
                elapsed_ms = %start.elapsed().as_millis(),
                "Mining abandoned"
            );
            return Err(e);
        }
    };

    let stats = MiningStats {
        attempts,
        elapsed: start.elapsed(),
    };
    info!(
        index = block.index,
        nonce = block.nonce,
        hash = %block.hash,
        attempts = stats.attempts,
        hash_rate = stats.hash_rate(),
        "Block sealed"
    );
    Ok((block, stats))
}
