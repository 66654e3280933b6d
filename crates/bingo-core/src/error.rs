use thiserror::Error;

use crate::types::GameStatus;

/// Top-level error type for Meeting Bingo.
///
/// Only setup and collaborator failures live here. Rejected grid mutations
/// (free space, finished game, unknown word) are silent no-ops and never
/// surface as a `BingoError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BingoError {
    #[error("Category '{category}' has {found} distinct words, at least {required} are required")]
    InsufficientWords {
        category: String,
        found: usize,
        required: usize,
    },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid game transition: {from} -> {to}")]
    InvalidTransition { from: GameStatus, to: GameStatus },

    #[error("No active game")]
    NoActiveGame,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Speech listener error: {0}")]
    Listener(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for BingoError {
    fn from(err: toml::de::Error) -> Self {
        BingoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BingoError {
    fn from(err: toml::ser::Error) -> Self {
        BingoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BingoError {
    fn from(err: serde_json::Error) -> Self {
        BingoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Meeting Bingo operations.
pub type Result<T> = std::result::Result<T, BingoError>;
