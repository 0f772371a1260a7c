//! Tunables for the chain, the miner and the difficulty controller.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DIFFICULTY_STEP, INITIAL_DIFFICULTY, MIN_DIFFICULTY, REWARD_AMOUNT, SLOW_BLOCK_THRESHOLD_MS,
    STOP_CHECK_INTERVAL,
};
use crate::difficulty::DifficultyController;
use crate::mine::Miner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Difficulty used for the first mined block.
    pub initial_difficulty: u32,

    /// Lowest difficulty the controller may step down to.
    pub min_difficulty: u32,

    /// Blocks taking at least this long lower the difficulty.
    pub slow_block_threshold_ms: u64,

    /// Amount added or removed per adjustment.
    pub difficulty_step: u32,

    /// Amount credited to the miner after each block.
    pub reward_amount: f64,

    /// How many nonces the miner tries between stop-signal checks.
    pub check_interval: u64,

    /// Upper bound on nonces tried per block. `None` searches forever.
    pub max_attempts: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: INITIAL_DIFFICULTY,
            min_difficulty: MIN_DIFFICULTY,
            slow_block_threshold_ms: SLOW_BLOCK_THRESHOLD_MS,
            difficulty_step: DIFFICULTY_STEP,
            reward_amount: REWARD_AMOUNT,
            check_interval: STOP_CHECK_INTERVAL,
            max_attempts: None,
        }
    }
}

impl ChainConfig {
    pub fn controller(&self) -> DifficultyController {
        DifficultyController::new(
            self.slow_block_threshold_ms,
            self.difficulty_step,
            self.min_difficulty,
        )
    }

    pub fn miner(&self) -> Miner {
        Miner::new(self.check_interval, self.max_attempts)
    }

    /// Parse a JSON config; missing fields fall back to the defaults.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
