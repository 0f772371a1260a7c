use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod mine;

pub use chain::{BlockObserver, BlockReport, Chain, MiningSummary, RoundPolicy, StopReason};
pub use config::ChainConfig;
pub use difficulty::DifficultyController;
pub use error::{ChainError, Result};
pub use mine::{Miner, StopSignal};

use constants::GENESIS_NOTE;

pub type Hash = [u8; 32];

/// Source of wall-clock time in milliseconds since the UNIX epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

impl Transaction {
    /// Build a transaction, rejecting blank parties and negative or non-finite amounts.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Result<Self> {
        let tx = Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        };
        tx.validate()?;
        Ok(tx)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            return Err(ChainError::InvalidTransaction("empty sender".into()));
        }
        if self.recipient.trim().is_empty() {
            return Err(ChainError::InvalidTransaction("empty recipient".into()));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(ChainError::InvalidTransaction(format!(
                "amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.recipient, self.amount)
    }
}

/// What a block carries: the genesis note, or the transactions snapshotted for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Note(String),
    Transactions(Vec<Transaction>),
}

impl Payload {
    /// Canonical hash input: JSON, transactions kept in queue order.
    ///
    /// Infallible: the payload is only strings and `f64`s, and serde_json
    /// writes non-finite floats as `null` rather than failing, so even a
    /// transaction built without [`Transaction::validate`] serializes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("strings and floats always serialize to JSON")
    }

    pub fn transactions(&self) -> &[Transaction] {
        match self {
            Payload::Note(_) => &[],
            Payload::Transactions(txs) => txs.as_slice(),
        }
    }
}

/// Digest of a block's canonical fields. `payload` is the output of
/// [`Payload::canonical_bytes`].
pub fn block_hash(
    index: u64,
    timestamp: u64,
    payload: &[u8],
    previous_hash: &Hash,
    nonce: u64,
) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update(payload);
    hasher.update(previous_hash);
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub payload: Payload,
    pub previous_hash: Hash,
    pub nonce: u64,
    pub hash: Hash,
    pub finish_timestamp: u64,
    /// Informational only; not part of the hash.
    pub uncle_hashes: Vec<Hash>,
}

impl Block {
    /// An unmined block at nonce 0 whose `hash` already reflects that nonce.
    pub fn candidate(index: u64, timestamp: u64, payload: Payload, previous_hash: Hash) -> Self {
        let hash = block_hash(index, timestamp, &payload.canonical_bytes(), &previous_hash, 0);
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            nonce: 0,
            hash,
            finish_timestamp: timestamp,
            uncle_hashes: Vec::new(),
        }
    }

    pub fn genesis(timestamp: u64) -> Self {
        Self::candidate(0, timestamp, Payload::Note(GENESIS_NOTE.to_string()), [0u8; 32])
    }

    /// Recompute the digest from the current fields.
    pub fn compute_hash(&self) -> Hash {
        block_hash(
            self.index,
            self.timestamp,
            &self.payload.canonical_bytes(),
            &self.previous_hash,
            self.nonce,
        )
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

pub mod pow {
    use super::Hash;
    use crate::constants::HASH_HEX_SIZE;

    /// Number of leading `'0'` characters in the lowercase hex form of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    /// Difficulty 0 accepts every digest; anything past the hex width accepts none.
    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        if difficulty as usize > HASH_HEX_SIZE {
            return false;
        }
        count_leading_zero_nibbles(hash) >= difficulty
    }
}
