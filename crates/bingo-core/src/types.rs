use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Grid constants
// =============================================================================

/// Width and height of a bingo card.
pub const GRID_SIZE: usize = 5;

/// Row and column of the free space.
pub const CENTER: usize = GRID_SIZE / 2;

/// Number of target words on a card (every cell except the free space).
pub const WORDS_PER_CARD: usize = GRID_SIZE * GRID_SIZE - 1;

/// Display text of the free space.
pub const FREE_SPACE_LABEL: &str = "FREE";

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of a game session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// No active card.
    #[default]
    Idle,
    /// A card is active and accepts mutations.
    Playing,
    /// A line was completed. Terminal until reset or a new card.
    Won,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Idle => write!(f, "idle"),
            GameStatus::Playing => write!(f, "playing"),
            GameStatus::Won => write!(f, "won"),
        }
    }
}

/// The kind of line that completed a bingo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum LineKind {
    Row(usize),
    Column(usize),
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl LineKind {
    /// Grid coordinates of the five cells on this line, in order.
    pub fn cells(&self) -> [(usize, usize); GRID_SIZE] {
        let mut cells = [(0, 0); GRID_SIZE];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = match *self {
                LineKind::Row(r) => (r, i),
                LineKind::Column(c) => (i, c),
                LineKind::Diagonal => (i, i),
                LineKind::AntiDiagonal => (i, GRID_SIZE - 1 - i),
            };
        }
        cells
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Row(r) => write!(f, "row {}", r),
            LineKind::Column(c) => write!(f, "column {}", c),
            LineKind::Diagonal => write!(f, "diagonal"),
            LineKind::AntiDiagonal => write!(f, "anti-diagonal"),
        }
    }
}

// =============================================================================
// Squares and cards
// =============================================================================

/// Stable identifier of the square at `(row, col)`.
pub fn square_id(row: usize, col: usize) -> String {
    format!("{}-{}", row, col)
}

/// One cell of a bingo card.
///
/// Invariant: a free-space square is always filled and never toggles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub word: String,
    pub is_free_space: bool,
    pub is_filled: bool,
    /// Set only when the square was filled by speech detection.
    pub is_auto_filled: bool,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Square {
    /// An unfilled word square.
    pub fn word(row: usize, col: usize, word: impl Into<String>) -> Self {
        Self {
            id: square_id(row, col),
            row,
            col,
            word: word.into(),
            is_free_space: false,
            is_filled: false,
            is_auto_filled: false,
            filled_at: None,
        }
    }

    /// The pre-filled free space.
    pub fn free_space(row: usize, col: usize) -> Self {
        Self {
            id: square_id(row, col),
            row,
            col,
            word: FREE_SPACE_LABEL.to_string(),
            is_free_space: true,
            is_filled: true,
            is_auto_filled: false,
            filled_at: None,
        }
    }
}

/// A 5x5 bingo card for one game.
///
/// Cards are values: every mutation builds a new `Card` from the previous one
/// (see `Card::with_square`), so readers holding an older card never observe
/// a half-applied change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub category: String,
    pub squares: [[Square; GRID_SIZE]; GRID_SIZE],
    /// The 24 target words in row-major order, free space excluded.
    pub words: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Square at `(row, col)`, or `None` when out of bounds.
    pub fn square(&self, row: usize, col: usize) -> Option<&Square> {
        self.squares.get(row).and_then(|r| r.get(col))
    }

    /// All squares in row-major order.
    pub fn iter_squares(&self) -> impl Iterator<Item = &Square> {
        self.squares.iter().flat_map(|row| row.iter())
    }

    /// Number of filled squares, free space included.
    pub fn filled_count(&self) -> usize {
        self.iter_squares().filter(|s| s.is_filled).count()
    }

    /// Case-folded words of filled, non-free squares.
    pub fn filled_words(&self) -> std::collections::HashSet<String> {
        self.iter_squares()
            .filter(|s| s.is_filled && !s.is_free_space)
            .map(|s| s.word.to_lowercase())
            .collect()
    }

    /// Position of the non-free square whose word equals `word` ignoring case.
    pub fn find_word(&self, word: &str) -> Option<(usize, usize)> {
        let needle = word.to_lowercase();
        self.iter_squares()
            .find(|s| !s.is_free_space && s.word.to_lowercase() == needle)
            .map(|s| (s.row, s.col))
    }

    /// Returns a new card with the square at its own `(row, col)` replaced.
    pub fn with_square(&self, square: Square) -> Card {
        let mut next = self.clone();
        let (row, col) = (square.row, square.col);
        next.squares[row][col] = square;
        next
    }
}

/// A completed line: its kind plus the ids of its five squares in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningLine {
    pub kind: LineKind,
    pub square_ids: Vec<String>,
}

impl WinningLine {
    pub fn new(kind: LineKind) -> Self {
        let square_ids = kind
            .cells()
            .iter()
            .map(|&(r, c)| square_id(r, c))
            .collect();
        Self { kind, square_ids }
    }

    /// Whether the square at `(row, col)` is part of this line.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.kind.cells().contains(&(row, col))
    }
}

// =============================================================================
// Persistence record
// =============================================================================

/// Flat, serializable snapshot of a game session.
///
/// A session is fully reconstructable from this record plus the category
/// catalog; nothing else is kept on the side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub status: GameStatus,
    pub category: Option<String>,
    pub card: Option<Card>,
    pub filled_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub winning_line: Option<WinningLine>,
    pub winning_word: Option<String>,
}

impl GameRecord {
    /// Whole minutes from start to completion, rounded. Zero if not finished.
    pub fn elapsed_minutes(&self) -> i64 {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => {
                let ms = (end - start).num_milliseconds();
                (ms as f64 / 60_000.0).round() as i64
            }
            _ => 0,
        }
    }

    /// Filled word squares, free space excluded.
    pub fn filled_words_count(&self) -> usize {
        self.filled_count.saturating_sub(1)
    }
}

// =============================================================================
// Tests
// =============================================================================
