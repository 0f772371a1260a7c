use crate::{
    block_hash,
    constants::{MAX_DIFFICULTY, STOP_CHECK_INTERVAL},
    pow::meets_difficulty,
    Block, ChainError, Clock, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative cancellation flag shared between the miner and whoever drives it.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Brute-force nonce search. Holds only its limits, nothing between calls.
#[derive(Clone, Copy, Debug)]
pub struct Miner {
    check_interval: u64,
    max_attempts: Option<u64>,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(STOP_CHECK_INTERVAL, None)
    }
}

impl Miner {
    pub fn new(check_interval: u64, max_attempts: Option<u64>) -> Self {
        Self {
            check_interval: check_interval.max(1),
            max_attempts,
        }
    }

    /// Increment `block.nonce` until the digest has `difficulty` leading hex zeros.
    ///
    /// The digest is recomputed from the block fields on every attempt. On
    /// success `hash` and `finish_timestamp` are set; `stop` is polled every
    /// `check_interval` attempts. A difficulty wider than the hex digest can
    /// never be met and fails without searching.
    pub fn mine<C: Clock + ?Sized>(
        &self,
        mut block: Block,
        difficulty: u32,
        stop: &StopSignal,
        clock: &C,
    ) -> Result<Block> {
        if difficulty > MAX_DIFFICULTY {
            warn!(index = block.index, difficulty, "difficulty exceeds digest width");
            return Err(ChainError::DifficultyUnreachable {
                difficulty,
                attempts: 0,
            });
        }
        if stop.is_stopped() {
            return Err(ChainError::Cancelled { attempts: 0 });
        }

        let payload = block.payload.canonical_bytes();
        let mut attempts = 0u64;
        let hash = loop {
            let hash = block_hash(
                block.index,
                block.timestamp,
                &payload,
                &block.previous_hash,
                block.nonce,
            );
            attempts += 1;
            if meets_difficulty(&hash, difficulty) {
                break hash;
            }
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(index = block.index, difficulty, attempts, "giving up on block");
                return Err(ChainError::DifficultyUnreachable {
                    difficulty,
                    attempts,
                });
            }
            if attempts % self.check_interval == 0 && stop.is_stopped() {
                warn!(index = block.index, attempts, "mining cancelled");
                return Err(ChainError::Cancelled { attempts });
            }
            block.nonce = block.nonce.wrapping_add(1);
        };

        block.hash = hash;
        block.finish_timestamp = clock.now_ms();
        info!(
            "Mined block {} with nonce {} and hash {}",
            block.index,
            block.nonce,
            hex::encode(hash)
        );
        Ok(block)
    }
}
