pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_NOTE: &str = "Genesis Block";
pub const REWARD_SENDER: &str = "System";
pub const REWARD_AMOUNT: f64 = 1.0;
pub const INITIAL_DIFFICULTY: u32 = 2;
pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const SLOW_BLOCK_THRESHOLD_MS: u64 = 5_000;
pub const DIFFICULTY_STEP: u32 = 1;
pub const STOP_CHECK_INTERVAL: u64 = 10_000;
