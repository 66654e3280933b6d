//! Game status transition table.
//!
//! - Idle -> Playing (start a game)
//! - Playing -> Playing (new card)
//! - Playing -> Won (a mutation completed a line)
//! - Won -> Playing (new card)
//! - Playing -> Idle, Won -> Idle (reset)

use bingo_core::error::BingoError;
use bingo_core::types::GameStatus;

/// Returns whether a transition from `from` to `to` is allowed.
pub fn can_transition(from: GameStatus, to: GameStatus) -> bool {
    matches!(
        (from, to),
        (GameStatus::Idle, GameStatus::Playing)
            | (GameStatus::Playing, GameStatus::Playing)
            | (GameStatus::Playing, GameStatus::Won)
            | (GameStatus::Won, GameStatus::Playing)
            | (GameStatus::Playing, GameStatus::Idle)
            | (GameStatus::Won, GameStatus::Idle)
    )
}

/// Validate a transition, returning `InvalidTransition` if it is not allowed.
pub fn validate_transition(from: GameStatus, to: GameStatus) -> Result<(), BingoError> {
    if can_transition(from, to) {
        tracing::debug!("Game status: {} -> {}", from, to);
        Ok(())
    } else {
        Err(BingoError::InvalidTransition { from, to })
    }
}
