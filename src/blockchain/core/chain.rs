use crate::blockchain::core::snapshot::LedgerSnapshot;
use crate::blockchain::core::state::ChainIndex;
use crate::blockchain::core::validation::{validate_chain, ChainViolation};
use crate::canonical::{format_float, json_float, transactions_json};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::miner::{self, CancelToken, MiningJob, CANCEL_CHECK_INTERVAL};
use crate::transaction::{now_timestamp, Transaction, TransactionId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

/// Hex-encoded SHA-256 block digest
pub type BlockHash = String;

pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_MINING_REWARD: f64 = 10.0;
/// A SHA-256 hex digest has 64 characters, so no nonce can satisfy more.
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    #[serde(with = "json_float")]
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: BlockHash,
    pub nonce: u64,
    pub hash: BlockHash,
}

/// Hash input split around the nonce. Everything except the nonce is fixed
/// while sealing, so the prefix digest state and the encoded transactions
/// are computed once per search.
struct SealingContext {
    prefix: Sha256,
    transactions: String,
}

impl SealingContext {
    fn new(block: &Block) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(block.index.to_string().as_bytes());
        prefix.update(format_float(block.timestamp).as_bytes());
        prefix.update(block.previous_hash.as_bytes());
        SealingContext {
            prefix,
            transactions: transactions_json(&block.transactions),
        }
    }

    fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(self.transactions.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Block {
    /// Build an unsealed candidate. The hash is computed for nonce 0, so the
    /// block is self-consistent but not necessarily difficulty-satisfying.
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<BlockHash>,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn genesis(timestamp: f64) -> Self {
        Block::new(0, timestamp, Vec::new(), GENESIS_PREVIOUS_HASH)
    }

    /// Digest of `(index, timestamp, previous_hash, nonce, transactions)`
    pub fn calculate_hash(&self) -> BlockHash {
        SealingContext::new(self).hash_with_nonce(self.nonce)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    /// Search nonces until the hash has `difficulty` leading zero hex digits.
    ///
    /// There is no iteration cap; use [`Block::seal_cancellable`] when the
    /// caller needs to bound the search.
    pub fn seal(&mut self, difficulty: u32) {
        let context = SealingContext::new(self);
        while !self.meets_difficulty(difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = context.hash_with_nonce(self.nonce);
        }
    }

    /// Same search as [`Block::seal`], polling `cancel` every
    /// `check_interval` nonces. Returns the number of nonces tried.
    pub fn seal_cancellable(
        &mut self,
        difficulty: u32,
        cancel: &CancelToken,
        check_interval: u64,
    ) -> Result<u64> {
        let check_interval = check_interval.max(1);
        let context = SealingContext::new(self);
        let mut attempts: u64 = 0;

        while !self.meets_difficulty(difficulty) {
            if attempts % check_interval == 0 && cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = context.hash_with_nonce(self.nonce);
            attempts += 1;
        }
        Ok(attempts)
    }
}

pub fn hash_meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Aggregate counters, computed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub total_transactions: usize,
    pub difficulty: u32,
    #[serde(with = "json_float")]
    pub mining_reward: f64,
    pub pending_transactions: usize,
}

/// The append-only chain together with the pool of transactions waiting to
/// be mined into it.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    difficulty: u32,
    mining_reward: f64,
    index: Option<ChainIndex>,
    cancel_check_interval: u64,
    // bumped whenever the chain is replaced wholesale by an import
    epoch: u64,
}

impl Blockchain {
    /// Create a ledger holding only a genesis block.
    pub fn new(difficulty: u32, mining_reward: f64) -> Result<Self> {
        check_difficulty(difficulty).map_err(LedgerError::InvalidConfig)?;

        let genesis = Block::genesis(now_timestamp());
        info!(hash = %genesis.hash, "Genesis block created");

        Ok(Blockchain {
            blocks: vec![genesis],
            mempool: Mempool::new(),
            difficulty,
            mining_reward,
            index: None,
            cancel_check_interval: CANCEL_CHECK_INTERVAL,
            epoch: 0,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let chain = Self::new(config.ledger.difficulty, config.ledger.mining_reward)?
            .with_index(config.ledger.indexed_queries)
            .with_cancel_check_interval(config.miner.cancel_check_interval);
        Ok(chain)
    }

    /// Keep an incrementally maintained balance and transaction index.
    /// Queries return the same results with or without it.
    pub fn with_index(mut self, enabled: bool) -> Self {
        self.index = enabled.then(|| ChainIndex::rebuild(&self.blocks));
        self
    }

    pub fn with_cancel_check_interval(mut self, interval: u64) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> &Block {
        // the chain always holds at least the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Queue a transfer stamped with the current time. Sender funds are not
    /// checked; overspending is allowed.
    pub fn submit_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> TransactionId {
        self.add_transaction(Transaction::new(sender, recipient, amount, now_timestamp()))
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> TransactionId {
        let id = tx.id.clone();
        info!(transaction_id = %id, "Transaction added");
        self.mempool.add_transaction(tx);
        id
    }

    /// Snapshot everything a miner needs to seal the next block.
    pub fn mining_job(&self, miner_address: &str) -> Result<MiningJob> {
        if self.mempool.is_empty() {
            return Err(LedgerError::EmptyPendingPool);
        }
        let tip = self.latest_block();
        Ok(MiningJob {
            transactions: self.mempool.transactions().to_vec(),
            miner_address: miner_address.to_string(),
            reward: self.mining_reward,
            previous_hash: tip.hash.clone(),
            index: self.blocks.len() as u64,
            difficulty: self.difficulty,
            epoch: self.epoch,
        })
    }

    /// Mine every pending transaction plus a reward for `miner_address` and
    /// append the result. Blocks until the proof-of-work is found.
    pub fn mine_pending(&mut self, miner_address: &str) -> Result<Block> {
        let job = self.mining_job(miner_address)?;
        let block = miner::mine_job(&job);
        self.commit_mined(&job, block)
    }

    /// Like [`Blockchain::mine_pending`], giving up with
    /// [`LedgerError::Cancelled`] once `cancel` fires. The ledger is left
    /// untouched when mining is cancelled.
    pub fn mine_pending_cancellable(
        &mut self,
        miner_address: &str,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let job = self.mining_job(miner_address)?;
        let (block, _) = miner::mine_cancellable(&job, cancel, self.cancel_check_interval)?;
        self.commit_mined(&job, block)
    }

    pub fn cancel_check_interval(&self) -> u64 {
        self.cancel_check_interval
    }

    /// Append a block mined from `job` and drop the mined transactions from
    /// the pool. Fails with [`LedgerError::StaleTip`] without changing
    /// anything if the ledger moved on since the job was cut.
    pub fn commit_mined(&mut self, job: &MiningJob, block: Block) -> Result<Block> {
        let tip = self.latest_block();
        if self.epoch != job.epoch
            || tip.hash != job.previous_hash
            || self.blocks.len() as u64 != job.index
            || block.previous_hash != tip.hash
            || !self.mempool.starts_with(&job.transactions)
        {
            return Err(LedgerError::StaleTip);
        }

        self.mempool.drain_front(job.transactions.len());
        self.append_block(block.clone());
        info!(
            index = block.index,
            hash = %block.hash,
            miner = %job.miner_address,
            "Block mined"
        );
        Ok(block)
    }

    fn append_block(&mut self, block: Block) {
        if let Some(index) = self.index.as_mut() {
            index.apply_block(self.blocks.len(), &block);
        }
        self.blocks.push(block);
    }

    /// Structural integrity check: every non-genesis block hashes to its
    /// stored hash and links to its predecessor.
    pub fn validate(&self) -> bool {
        match self.validation_report() {
            Ok(()) => {
                debug!(blocks = self.blocks.len(), "Blockchain is valid");
                true
            }
            Err(violation) => {
                error!("{}", violation);
                false
            }
        }
    }

    pub fn validation_report(&self) -> std::result::Result<(), ChainViolation> {
        validate_chain(&self.blocks)
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        match &self.index {
            Some(index) => index.get_balance(address),
            None => self.scan_balance(address),
        }
    }

    /// Replay every transaction on the chain. Pending transactions do not
    /// count.
    pub fn scan_balance(&self, address: &str) -> f64 {
        let mut balance = 0.0;
        for tx in self.blocks.iter().flat_map(|b| b.transactions.iter()) {
            if tx.sender == address {
                balance -= tx.amount;
            }
            if tx.recipient == address {
                balance += tx.amount;
            }
        }
        balance
    }

    pub fn find_block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// First on-chain transaction with `id`, in chain order. The pending
    /// pool is not searched.
    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        match &self.index {
            Some(index) => index
                .locate(id)
                .and_then(|(block, pos)| self.blocks.get(block)?.transactions.get(pos)),
            None => self
                .blocks
                .iter()
                .flat_map(|b| b.transactions.iter())
                .find(|tx| tx.id == id),
        }
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.blocks.len(),
            total_transactions: self.blocks.iter().map(|b| b.transactions.len()).sum(),
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
            pending_transactions: self.mempool.len(),
        }
    }

    pub fn export(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.blocks.clone(),
            pending_transactions: self.mempool.transactions().to_vec(),
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
        }
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Replace the whole ledger with `snapshot`.
    ///
    /// Hashes and links are not re-checked; call [`Blockchain::validate`]
    /// afterwards when the data is untrusted. Structurally unusable data is
    /// rejected and the ledger is left as it was.
    pub fn import(&mut self, snapshot: LedgerSnapshot) -> Result<()> {
        snapshot.check_structure()?;

        let LedgerSnapshot {
            chain,
            pending_transactions,
            difficulty,
            mining_reward,
        } = snapshot;

        self.blocks = chain;
        self.mempool = Mempool::from_transactions(pending_transactions);
        self.difficulty = difficulty;
        self.mining_reward = mining_reward;
        if self.index.is_some() {
            self.index = Some(ChainIndex::rebuild(&self.blocks));
        }
        self.epoch += 1;

        info!(
            blocks = self.blocks.len(),
            pending = self.mempool.len(),
            "Ledger imported"
        );
        Ok(())
    }

    pub fn import_json(&mut self, data: &str) -> Result<()> {
        let snapshot = LedgerSnapshot::from_json(data)?;
        self.import(snapshot)
    }
}

pub(crate) fn check_difficulty(difficulty: u32) -> std::result::Result<(), String> {
    if difficulty > MAX_DIFFICULTY {
        return Err(format!(
            "difficulty {} exceeds the maximum of {}",
            difficulty, MAX_DIFFICULTY
        ));
    }
    Ok(())
}
