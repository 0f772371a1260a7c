use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The search gave up after `attempts` nonces without meeting `difficulty`.
    #[error("difficulty {difficulty} unreachable within {attempts} attempts")]
    DifficultyUnreachable { difficulty: u32, attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}
