//! Difficulty retargeting after each mined block.
//!
//! A binary controller: a block that took at least the threshold lowers the
//! difficulty by one step, a faster block raises it by one step.

use crate::constants::{DIFFICULTY_STEP, MAX_DIFFICULTY, MIN_DIFFICULTY, SLOW_BLOCK_THRESHOLD_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyController {
    threshold_ms: u64,
    step: u32,
    floor: u32,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(SLOW_BLOCK_THRESHOLD_MS, DIFFICULTY_STEP, MIN_DIFFICULTY)
    }
}

impl DifficultyController {
    pub fn new(threshold_ms: u64, step: u32, floor: u32) -> Self {
        Self {
            threshold_ms,
            step,
            floor: floor.min(MAX_DIFFICULTY),
        }
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    /// Difficulty for the next block.
    ///
    /// `previous_finish` is `None` while no mined predecessor exists, in which
    /// case `difficulty` is returned unchanged. The result stays within
    /// `[floor, 64]`.
    pub fn adjust(&self, difficulty: u32, previous_finish: Option<u64>, current_finish: u64) -> u32 {
        match previous_finish {
            None => difficulty,
            Some(previous) => self.retarget(difficulty, current_finish.saturating_sub(previous)),
        }
    }

    pub fn retarget(&self, difficulty: u32, elapsed_ms: u64) -> u32 {
        let next = if elapsed_ms >= self.threshold_ms {
            difficulty.saturating_sub(self.step)
        } else {
            difficulty.saturating_add(self.step)
        };
        next.clamp(self.floor, MAX_DIFFICULTY)
    }
}
