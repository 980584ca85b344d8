//! Owned, lock-protected ledger instance for serving layers.

use crate::blockchain::{Block, Blockchain, ChainStats, LedgerSnapshot};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::miner::{self, CancelToken};
use crate::persistence;
use crate::transaction::{Transaction, TransactionId};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Cloneable handle to one ledger.
///
/// Queries and submissions hold the lock only for their own duration. Mining
/// cuts a job under the read lock, runs the proof-of-work with no lock held,
/// and takes the write lock just to append, retrying against the new tip if
/// another miner or an import got there first.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Blockchain>>,
}

impl SharedLedger {
    pub fn new(chain: Blockchain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Read access for queries that need several values from one consistent
    /// view.
    pub fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.inner.read()
    }

    pub fn submit_transaction(&self, sender: &str, recipient: &str, amount: f64) -> TransactionId {
        self.inner.write().submit_transaction(sender, recipient, amount)
    }

    pub fn mine_pending(&self, miner_address: &str, cancel: &CancelToken) -> Result<Block> {
        loop {
            let (job, check_interval) = {
                let chain = self.inner.read();
                (chain.mining_job(miner_address)?, chain.cancel_check_interval())
            };

            let (block, _) = miner::mine_cancellable(&job, cancel, check_interval)?;

            match self.inner.write().commit_mined(&job, block) {
                Err(LedgerError::StaleTip) => {
                    warn!(index = job.index, "Chain tip moved while mining, retrying");
                }
                result => return result,
            }
        }
    }

    pub fn validate(&self) -> bool {
        self.inner.read().validate()
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.inner.read().balance_of(address)
    }

    pub fn find_block(&self, index: u64) -> Option<Block> {
        self.inner.read().find_block(index).cloned()
    }

    pub fn find_transaction(&self, id: &str) -> Option<Transaction> {
        self.inner.read().find_transaction(id).cloned()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.inner.read().pending_transactions().to_vec()
    }

    pub fn stats(&self) -> ChainStats {
        self.inner.read().stats()
    }

    pub fn export(&self) -> LedgerSnapshot {
        self.inner.read().export()
    }

    pub fn import(&self, snapshot: LedgerSnapshot) -> Result<()> {
        self.inner.write().import(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
    ShuttingDown,
}

/// A ledger plus the configuration and lifecycle around it.
pub struct LedgerNode {
    config: Config,
    ledger: SharedLedger,
    state: RwLock<NodeState>,
    // parent of every mining request's token; cancelled on shutdown
    shutdown: CancelToken,
}

impl LedgerNode {
    /// Construct the ledger, restoring the configured snapshot file when it
    /// exists.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;

        let chain = match &config.storage.snapshot_path {
            Some(path) => persistence::load_or_create(path, &config)?,
            None => Blockchain::from_config(&config)?,
        };
        info!(
            blocks = chain.len(),
            difficulty = chain.difficulty(),
            "Ledger node initialised"
        );

        let node = Self {
            config,
            ledger: SharedLedger::new(chain),
            state: RwLock::new(NodeState::Booting),
            shutdown: CancelToken::new(),
        };
        *node.state.write() = NodeState::Ready;
        Ok(node)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Mine under the configured time limit. Fails with
    /// [`LedgerError::Cancelled`] if the limit passes or the node shuts down
    /// first.
    pub fn mine_pending(&self, miner_address: &str) -> Result<Block> {
        self.mine_pending_within(miner_address, self.config.miner.mining_timeout())
    }

    pub fn mine_pending_within(
        &self,
        miner_address: &str,
        timeout: Option<Duration>,
    ) -> Result<Block> {
        if self.state() == NodeState::ShuttingDown {
            return Err(LedgerError::Cancelled);
        }
        let cancel = self.shutdown.child(timeout);
        self.ledger.mine_pending(miner_address, &cancel)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.export()
    }

    pub fn save_snapshot(&self) -> Result<()> {
        match &self.config.storage.snapshot_path {
            Some(path) => persistence::save_snapshot(path, &self.snapshot()),
            None => Ok(()),
        }
    }

    /// Refuse new mining requests and cancel the ones in flight. Queries
    /// and submissions keep working so a server can drain its connections.
    pub fn begin_shutdown(&self) {
        *self.state.write() = NodeState::ShuttingDown;
        self.shutdown.cancel();
    }

    /// Stop in-flight mining and, if configured, write the snapshot file.
    pub fn shutdown(&self) -> Result<()> {
        self.begin_shutdown();
        if self.config.storage.save_on_shutdown {
            self.save_snapshot()?;
        }
        info!("Ledger node stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn shared(difficulty: u32) -> SharedLedger {
        let chain = Blockchain::new(difficulty, 10.0)
            .unwrap()
            .with_cancel_check_interval(64);
        SharedLedger::new(chain)
    }

    fn node_config(difficulty: u32) -> Config {
        let mut config = Config::default();
        config.ledger.difficulty = difficulty;
        config.miner.cancel_check_interval = 64;
        config
    }

    #[test]
    fn test_shared_mining() {
        let ledger = shared(2);
        ledger.submit_transaction("Alice", "Bob", 50.0);
        let block = ledger.mine_pending("M1", &CancelToken::new()).unwrap();

        assert!(block.meets_difficulty(2));
        assert_eq!(ledger.stats().total_blocks, 2);
        assert!(ledger.pending_transactions().is_empty());
        assert!(ledger.validate());
        assert_eq!(ledger.find_block(1), Some(block));
    }

    #[test]
    fn test_shared_empty_pool() {
        let ledger = shared(1);
        assert_eq!(
            ledger.mine_pending("M1", &CancelToken::new()),
            Err(LedgerError::EmptyPendingPool)
        );
    }

    #[test]
    fn test_reads_proceed_while_mining() {
        let ledger = shared(64);
        ledger.submit_transaction("Alice", "Bob", 1.0);
        let cancel = CancelToken::new();

        let miner = {
            let ledger = ledger.clone();
            let cancel = cancel.clone();
            thread::spawn(move || ledger.mine_pending("M1", &cancel))
        };
        thread::sleep(Duration::from_millis(20));

        // neither of these would complete if the search held the lock
        ledger.submit_transaction("Carol", "Dave", 2.0);
        assert_eq!(ledger.stats().pending_transactions, 2);

        cancel.cancel();
        assert_eq!(miner.join().unwrap(), Err(LedgerError::Cancelled));
        assert_eq!(ledger.stats().total_blocks, 1);
        assert_eq!(ledger.pending_transactions().len(), 2);
    }

    #[test]
    fn test_concurrent_miners_never_fork() {
        let ledger = shared(2);
        for i in 0..4 {
            ledger.submit_transaction("Alice", "Bob", i as f64);
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.mine_pending(&format!("M{}", i), &CancelToken::new()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let mined = results.iter().filter(|r| r.is_ok()).count();
        assert!(mined >= 1);
        assert!(results
            .iter()
            .all(|r| r.is_ok() || *r == Err(LedgerError::EmptyPendingPool)));
        assert_eq!(ledger.stats().total_blocks, 1 + mined);
        assert!(ledger.validate());

        // every submitted transaction landed in exactly one block
        let chain = ledger.read();
        let user_txs = chain
            .blocks()
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !tx.is_reward())
            .count();
        assert_eq!(user_txs, 4);
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_node_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut config = node_config(1);
        config.storage.snapshot_path = Some(path.to_string_lossy().into_owned());

        let node = LedgerNode::init(config.clone()).unwrap();
        assert_eq!(node.state(), NodeState::Ready);
        node.shared().submit_transaction("Alice", "Bob", 5.0);
        node.mine_pending("M1").unwrap();
        node.shutdown().unwrap();
        assert_eq!(node.state(), NodeState::ShuttingDown);
        assert_eq!(node.mine_pending("M1"), Err(LedgerError::Cancelled));

        let restored = LedgerNode::init(config).unwrap();
        assert_eq!(restored.snapshot(), node.snapshot());
        assert_eq!(restored.shared().balance_of("Bob"), 5.0);
    }

    #[test]
    fn test_node_mining_timeout() {
        let node = LedgerNode::init(node_config(64)).unwrap();
        node.shared().submit_transaction("Alice", "Bob", 5.0);
        let result = node.mine_pending_within("M1", Some(Duration::from_millis(20)));
        assert_eq!(result, Err(LedgerError::Cancelled));
        assert_eq!(node.shared().stats().total_blocks, 1);
    }

    #[test]
    fn test_begin_shutdown_cancels_running_mining() {
        let node = Arc::new(LedgerNode::init(node_config(64)).unwrap());
        node.shared().submit_transaction("Alice", "Bob", 5.0);

        let miner = {
            let node = node.clone();
            thread::spawn(move || node.mine_pending("M1"))
        };
        thread::sleep(Duration::from_millis(20));

        node.begin_shutdown();
        assert_eq!(miner.join().unwrap(), Err(LedgerError::Cancelled));
        assert_eq!(node.state(), NodeState::ShuttingDown);
        assert_eq!(node.shared().stats().total_blocks, 1);
        assert_eq!(node.shared().pending_transactions().len(), 1);
    }

    #[test]
    fn test_shutdown_without_snapshot_path() {
        let node = LedgerNode::init(node_config(1)).unwrap();
        assert!(node.shutdown().is_ok());
    }
}
