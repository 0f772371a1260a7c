use crate::{
    config::ChainConfig,
    constants::{MAX_DIFFICULTY, REWARD_SENDER},
    difficulty::DifficultyController,
    mine::{Miner, StopSignal},
    Block, ChainError, Clock, Hash, Payload, Result, SystemClock, Transaction,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Receives a report for every block appended by [`Chain::mine_if_pending`].
pub trait BlockObserver {
    fn block_mined(&mut self, report: &BlockReport);
}

impl<F: FnMut(&BlockReport)> BlockObserver for F {
    fn block_mined(&mut self, report: &BlockReport) {
        self(report)
    }
}

/// Human-facing snapshot of a block, digests rendered as hex.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockReport {
    pub index: u64,
    pub timestamp: u64,
    pub payload: Payload,
    pub previous_hash: String,
    pub hash: String,
    pub finish_timestamp: u64,
    pub nonce: u64,
    pub uncle_indices: Vec<u64>,
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        match &self.payload {
            Payload::Note(note) => writeln!(f, "Data: {note}")?,
            Payload::Transactions(txs) => {
                writeln!(f, "Data: {} transaction(s)", txs.len())?;
                for tx in txs {
                    writeln!(f, "  {tx}")?;
                }
            }
        }
        writeln!(f, "Previous Hash: {}", self.previous_hash)?;
        writeln!(f, "Hash: {}", self.hash)?;
        writeln!(f, "Finish Timestamp: {}", self.finish_timestamp)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Uncle Blocks: {:?}", self.uncle_indices)
    }
}

/// Exit conditions for chained mining rounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundPolicy {
    /// `None` keeps mining for as long as the queue refills.
    pub max_rounds: Option<u64>,
}

impl RoundPolicy {
    pub fn once() -> Self {
        Self::rounds(1)
    }

    pub fn rounds(n: u64) -> Self {
        Self {
            max_rounds: Some(n),
        }
    }

    pub fn unbounded() -> Self {
        Self { max_rounds: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    QueueEmpty,
    RoundLimit,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MiningSummary {
    pub rounds: u64,
    pub stop_reason: StopReason,
    pub height: u64,
    pub difficulty: u32,
}

/// In-memory chain: mined blocks, the pending queue and the current difficulty.
pub struct Chain<C: Clock = SystemClock> {
    blocks: Vec<Block>,
    difficulty: u32,
    pending: Vec<Transaction>,
    uncles: HashMap<Hash, Vec<Block>>,
    config: ChainConfig,
    controller: DifficultyController,
    miner: Miner,
    clock: C,
}

impl Chain<SystemClock> {
    pub fn new(config: ChainConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for Chain<SystemClock> {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl<C: Clock> Chain<C> {
    /// Start a chain holding only the genesis block, stamped by `clock`.
    ///
    /// The initial difficulty is clamped to `[min_difficulty, 64]`.
    pub fn with_clock(config: ChainConfig, clock: C) -> Self {
        let genesis = Block::genesis(clock.now_ms());
        let controller = config.controller();
        let difficulty = config
            .initial_difficulty
            .clamp(controller.floor(), MAX_DIFFICULTY);
        Self {
            blocks: vec![genesis],
            difficulty,
            pending: Vec::new(),
            uncles: HashMap::new(),
            controller,
            miner: config.miner(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn latest_block(&self) -> &Block {
        // Never empty, genesis is pushed in `with_clock`.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Blocks recorded as uncles of the block with digest `hash`.
    pub fn uncles_of(&self, hash: &Hash) -> &[Block] {
        self.uncles.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        tx.validate()?;
        debug!(%tx, queued = self.pending.len() + 1, "transaction queued");
        self.pending.push(tx);
        Ok(())
    }

    pub fn report(&self, block: &Block) -> BlockReport {
        BlockReport {
            index: block.index,
            timestamp: block.timestamp,
            payload: block.payload.clone(),
            previous_hash: hex::encode(block.previous_hash),
            hash: hex::encode(block.hash),
            finish_timestamp: block.finish_timestamp,
            nonce: block.nonce,
            uncle_indices: self.uncles_of(&block.hash).iter().map(|b| b.index).collect(),
        }
    }

    /// One report per block, genesis first.
    pub fn reports(&self) -> impl Iterator<Item = BlockReport> + '_ {
        self.blocks.iter().map(|b| self.report(b))
    }

    /// Mine a single block from the pending queue.
    ///
    /// Returns `Ok(None)` without touching any state when the queue is empty.
    /// If the search fails the snapshot goes back to the front of the queue
    /// and the chain and difficulty are left as they were.
    pub fn mine_round(&mut self, miner_address: &str, stop: &StopSignal) -> Result<Option<BlockReport>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let reward = Transaction::new(REWARD_SENDER, miner_address, self.config().reward_amount)?;

        let txs = std::mem::take(&mut self.pending);
        let (index, previous_hash) = {
            let tail = self.latest_block();
            (tail.index + 1, tail.hash)
        };
        let candidate = Block::candidate(
            index,
            self.clock.now_ms(),
            Payload::Transactions(txs.clone()),
            previous_hash,
        );
        debug!(index, difficulty = self.difficulty, txs = txs.len(), "mining candidate");

        let mined = match self.miner.mine(candidate, self.difficulty, stop, &self.clock) {
            Ok(block) => block,
            Err(e) => {
                let queued_meanwhile = std::mem::replace(&mut self.pending, txs);
                self.pending.extend(queued_meanwhile);
                return Err(e);
            }
        };

        // The genesis block was never mined, so its timestamp says nothing
        // about mining speed.
        let previous_finish = (self.blocks.len() > 1).then(|| self.latest_block().finish_timestamp);
        let finish = mined.finish_timestamp;
        let hash = mined.hash;
        // Genesis is always below the new block, so every mined block gets
        // exactly one uncle: the tail it was mined on.
        let uncle = self.latest_block().clone();
        self.blocks.push(mined);
        let last = self.blocks.len() - 1;
        self.blocks[last].uncle_hashes.push(uncle.hash);
        self.uncles.entry(hash).or_default().push(uncle);

        let before = self.difficulty;
        self.difficulty = self.controller.adjust(before, previous_finish, finish);
        if let Some(prev) = previous_finish {
            debug!(
                elapsed_ms = finish.saturating_sub(prev),
                from = before,
                to = self.difficulty,
                "difficulty adjusted"
            );
        }

        self.pending.push(reward);
        Ok(Some(self.report(self.latest_block())))
    }

    /// Mine rounds while transactions are pending.
    ///
    /// Every round enqueues a reward, so the queue never drains on its own;
    /// `policy` and `stop` are what end the loop. A cancelled search ends it
    /// with [`StopReason::Cancelled`] instead of an error.
    pub fn mine_if_pending<O: BlockObserver + ?Sized>(
        &mut self,
        miner_address: &str,
        policy: RoundPolicy,
        stop: &StopSignal,
        observer: &mut O,
    ) -> Result<MiningSummary> {
        let mut rounds = 0u64;
        let stop_reason = loop {
            if self.pending.is_empty() {
                break StopReason::QueueEmpty;
            }
            if policy.max_rounds.is_some_and(|max| rounds >= max) {
                break StopReason::RoundLimit;
            }
            if stop.is_stopped() {
                break StopReason::Cancelled;
            }
            match self.mine_round(miner_address, stop) {
                Ok(Some(report)) => {
                    observer.block_mined(&report);
                    rounds += 1;
                }
                Ok(None) => break StopReason::QueueEmpty,
                Err(ChainError::Cancelled { .. }) => break StopReason::Cancelled,
                Err(e) => return Err(e),
            }
        };

        let summary = MiningSummary {
            rounds,
            stop_reason,
            height: self.latest_block().index,
            difficulty: self.difficulty,
        };
        if rounds > 0 {
            info!(?summary, "mining stopped");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> impl FnMut(&BlockReport) {
        |_: &BlockReport| {}
    }

    #[test]
    fn new_chain_holds_genesis_only() {
        let chain = Chain::new(ChainConfig::default());
        assert_eq!(chain.len(), 1);
        assert!(!chain.is_empty());
        assert_eq!(chain.difficulty(), 2);
        assert!(chain.pending().is_empty());
        assert_eq!(chain.latest_block().index, 0);
        assert!(chain.uncles_of(&chain.latest_block().hash).is_empty());
    }

    #[test]
    fn invalid_transaction_is_not_queued() {
        let mut chain = Chain::new(ChainConfig::default());
        let bad = Transaction {
            sender: "Alice".into(),
            recipient: "Bob".into(),
            amount: -1.0,
        };
        assert!(matches!(
            chain.add_transaction(bad),
            Err(ChainError::InvalidTransaction(_))
        ));
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn empty_miner_address_is_rejected() {
        let mut chain = Chain::new(ChainConfig::default());
        chain
            .add_transaction(Transaction::new("Sender0", "Recipient0", 0.5).unwrap())
            .unwrap();
        let err = chain.mine_round("", &StopSignal::new()).unwrap_err();
        assert!(matches!(err, ChainError::InvalidTransaction(_)));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn single_round_appends_and_rewards() {
        let mut chain = Chain::new(ChainConfig::default());
        chain
            .add_transaction(Transaction::new("Sender0", "Recipient0", 0.5).unwrap())
            .unwrap();
        let report = chain
            .mine_round("Miner0", &StopSignal::new())
            .unwrap()
            .expect("queue was not empty");
        assert_eq!(report.index, 1);
        assert!(report.hash.starts_with("00"));
        assert_eq!(report.uncle_indices, vec![0]);
        assert_eq!(chain.difficulty(), 2);
        assert_eq!(
            chain.pending(),
            &[Transaction::new("System", "Miner0", 1.0).unwrap()]
        );
    }

    #[test]
    fn failed_round_restores_queue() {
        let cfg = ChainConfig {
            initial_difficulty: 30,
            max_attempts: Some(50),
            ..ChainConfig::default()
        };
        let mut chain = Chain::new(cfg);
        let tx = Transaction::new("Sender0", "Recipient0", 0.5).unwrap();
        chain.add_transaction(tx.clone()).unwrap();
        let err = chain.mine_round("Miner0", &StopSignal::new()).unwrap_err();
        assert_eq!(
            err,
            ChainError::DifficultyUnreachable {
                difficulty: 30,
                attempts: 50
            }
        );
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), 30);
        assert_eq!(chain.pending(), &[tx]);
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let mut chain = Chain::new(ChainConfig::default());
        let summary = chain
            .mine_if_pending("Miner0", RoundPolicy::unbounded(), &StopSignal::new(), &mut noop())
            .unwrap();
        assert_eq!(summary.rounds, 0);
        assert_eq!(summary.stop_reason, StopReason::QueueEmpty);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), 2);
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn raised_stop_signal_prevents_rounds() {
        let mut chain = Chain::new(ChainConfig::default());
        chain
            .add_transaction(Transaction::new("Sender0", "Recipient0", 0.5).unwrap())
            .unwrap();
        let stop = StopSignal::new();
        stop.stop();
        let summary = chain
            .mine_if_pending("Miner0", RoundPolicy::unbounded(), &stop, &mut noop())
            .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn initial_difficulty_is_clamped_to_floor() {
        let cfg = ChainConfig {
            initial_difficulty: 0,
            min_difficulty: 1,
            ..ChainConfig::default()
        };
        let mut chain = Chain::new(cfg);
        assert_eq!(chain.difficulty(), 1);
        chain
            .add_transaction(Transaction::new("Sender0", "Recipient0", 0.5).unwrap())
            .unwrap();
        let report = chain.mine_round("Miner0", &StopSignal::new()).unwrap().unwrap();
        assert!(report.hash.starts_with('0'));
        assert_eq!(chain.difficulty(), 1);
    }

    #[test]
    fn initial_difficulty_is_clamped_to_hex_width() {
        let cfg = ChainConfig {
            initial_difficulty: 65,
            ..ChainConfig::default()
        };
        assert_eq!(Chain::new(cfg).difficulty(), MAX_DIFFICULTY);
    }

    #[test]
    fn stop_during_search_restores_queue() {
        let cfg = ChainConfig {
            initial_difficulty: 64,
            check_interval: 256,
            ..ChainConfig::default()
        };
        let mut chain = Chain::new(cfg);
        let first = Transaction::new("Sender0", "Recipient0", 0.5).unwrap();
        let second = Transaction::new("Sender1", "Recipient1", 1.5).unwrap();
        chain.add_transaction(first.clone()).unwrap();
        chain.add_transaction(second.clone()).unwrap();

        let stop = StopSignal::new();
        let remote = stop.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            remote.stop();
        });
        let summary = chain
            .mine_if_pending("Miner0", RoundPolicy::unbounded(), &stop, &mut noop())
            .unwrap();
        stopper.join().unwrap();

        assert_eq!(summary.rounds, 0);
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), 64);
        assert_eq!(chain.pending(), &[first, second]);
    }

    #[test]
    fn report_display_lists_fields() {
        let chain = Chain::new(ChainConfig::default());
        let text = chain.reports().next().unwrap().to_string();
        assert!(text.starts_with("Block #0\n"));
        assert!(text.contains("Data: Genesis Block"));
        assert!(text.contains(&format!("Previous Hash: {}", "0".repeat(64))));
        assert!(text.ends_with("Uncle Blocks: []"));
    }
}
