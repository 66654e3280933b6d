//! Copy-on-write grid mutations.
//!
//! Every operation takes a card by reference and returns a new card value.
//! Invalid mutations are silent no-ops that hand back an unchanged clone;
//! the `try_` variants report why a mutation was rejected.

use chrono::Utc;
use thiserror::Error;

use bingo_core::types::Card;

/// Why a grid mutation was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Square ({row}, {col}) is outside the grid")]
    OutOfBounds { row: usize, col: usize },

    #[error("The free space cannot be toggled")]
    FreeSpace,

    #[error("Square for '{0}' is already filled")]
    AlreadyFilled(String),

    #[error("No square on this card holds '{0}'")]
    UnmatchedWord(String),
}

/// Flip the fill state of the square at `(row, col)`.
///
/// Filling stamps `filled_at` with the current time; clearing removes it.
/// `is_auto_filled` is never set here, and is reset when a square is
/// cleared.
pub fn try_toggle_manual(card: &Card, row: usize, col: usize) -> Result<Card, GridError> {
    let square = card
        .square(row, col)
        .ok_or(GridError::OutOfBounds { row, col })?;
    if square.is_free_space {
        return Err(GridError::FreeSpace);
    }

    let mut next = square.clone();
    next.is_filled = !square.is_filled;
    if next.is_filled {
        next.filled_at = Some(Utc::now());
    } else {
        next.filled_at = None;
        next.is_auto_filled = false;
    }
    Ok(card.with_square(next))
}

/// Fill the unfilled, non-free square whose word equals `word` ignoring case.
pub fn try_auto_fill(card: &Card, word: &str) -> Result<Card, GridError> {
    let (row, col) = card
        .find_word(word)
        .ok_or_else(|| GridError::UnmatchedWord(word.to_string()))?;
    let square = &card.squares[row][col];
    if square.is_filled {
        return Err(GridError::AlreadyFilled(square.word.clone()));
    }

    let mut next = square.clone();
    next.is_filled = true;
    next.is_auto_filled = true;
    next.filled_at = Some(Utc::now());
    Ok(card.with_square(next))
}

/// Manual toggle that never fails: rejected toggles return the card as-is.
pub fn toggle_manual(card: &Card, row: usize, col: usize) -> Card {
    match try_toggle_manual(card, row, col) {
        Ok(next) => next,
        Err(e) => {
            tracing::debug!(row, col, reason = %e, "Manual toggle ignored");
            card.clone()
        }
    }
}

/// Auto-fill that never fails: unknown or already-filled words return the
/// card as-is.
pub fn auto_fill(card: &Card, word: &str) -> Card {
    match try_auto_fill(card, word) {
        Ok(next) => next,
        Err(e @ GridError::UnmatchedWord(_)) => {
            // The matcher only reports card words, so this is a caller fault.
            tracing::warn!(word, reason = %e, "Auto-fill for a word not on the card");
            card.clone()
        }
        Err(e) => {
            tracing::debug!(word, reason = %e, "Auto-fill ignored");
            card.clone()
        }
    }
}

/// Number of filled squares, free space included (never below 1).
pub fn fill_count(card: &Card) -> usize {
    card.filled_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use bingo_core::category::Category;
    use bingo_core::types::{CENTER, GRID_SIZE};

    use crate::card::CardGenerator;

    fn card() -> Card {
        let category = Category {
            id: "t".into(),
            name: "T".into(),
            icon: String::new(),
            description: String::new(),
            words: (0..24).map(|i| format!("Word{}", i)).collect(),
            aliases: BTreeMap::new(),
        };
        CardGenerator::new().generate(&category).unwrap()
    }

    #[test]
    fn test_toggle_fills_then_clears() {
        let card = card();
        let filled = toggle_manual(&card, 0, 0);
        let sq = filled.square(0, 0).unwrap();
        assert!(sq.is_filled);
        assert!(!sq.is_auto_filled);
        assert!(sq.filled_at.is_some());
        assert_eq!(fill_count(&filled), 2);

        let cleared = toggle_manual(&filled, 0, 0);
        let sq = cleared.square(0, 0).unwrap();
        assert!(!sq.is_filled);
        assert!(sq.filled_at.is_none());
        assert_eq!(fill_count(&cleared), 1);
    }

    #[test]
    fn test_toggle_does_not_touch_input() {
        let card = card();
        let _ = toggle_manual(&card, 1, 1);
        assert!(!card.square(1, 1).unwrap().is_filled);
    }

    #[test]
    fn test_toggle_free_space_is_noop() {
        let card = card();
        assert_eq!(try_toggle_manual(&card, CENTER, CENTER), Err(GridError::FreeSpace));
        assert_eq!(toggle_manual(&card, CENTER, CENTER), card);
    }

    #[test]
    fn test_toggle_out_of_bounds_is_noop() {
        let card = card();
        assert_eq!(
            try_toggle_manual(&card, GRID_SIZE, 0),
            Err(GridError::OutOfBounds { row: GRID_SIZE, col: 0 })
        );
        assert_eq!(toggle_manual(&card, 0, 9), card);
    }

    #[test]
    fn test_auto_fill_marks_square() {
        let card = card();
        let word = card.squares[3][4].word.clone();
        let next = auto_fill(&card, &word.to_uppercase());
        let sq = next.square(3, 4).unwrap();
        assert!(sq.is_filled);
        assert!(sq.is_auto_filled);
        assert!(sq.filled_at.is_some());
        assert_eq!(fill_count(&next), 2);
    }

    #[test]
    fn test_auto_fill_already_filled_is_noop() {
        let card = card();
        let word = card.squares[0][1].word.clone();
        let manual = toggle_manual(&card, 0, 1);
        assert_eq!(
            try_auto_fill(&manual, &word),
            Err(GridError::AlreadyFilled(word.clone()))
        );
        let after = auto_fill(&manual, &word);
        assert_eq!(after, manual);
        assert!(!after.square(0, 1).unwrap().is_auto_filled);
    }

    #[test]
    fn test_auto_fill_unknown_word_is_noop() {
        let card = card();
        assert!(matches!(
            try_auto_fill(&card, "nonexistent"),
            Err(GridError::UnmatchedWord(_))
        ));
        assert_eq!(auto_fill(&card, "nonexistent"), card);
        assert_eq!(auto_fill(&card, "FREE"), card);
    }

    #[test]
    fn test_clearing_auto_filled_square_resets_flag() {
        let card = card();
        let word = card.squares[4][4].word.clone();
        let auto = auto_fill(&card, &word);
        let cleared = toggle_manual(&auto, 4, 4);
        let sq = cleared.square(4, 4).unwrap();
        assert!(!sq.is_filled);
        assert!(!sq.is_auto_filled);
    }
}
