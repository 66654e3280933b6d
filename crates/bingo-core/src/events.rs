use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::WinningLine;

/// Where a square mutation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSource {
    /// The player tapped the square.
    Manual,
    /// A spoken word was detected.
    Speech,
}

/// Everything observable that happens in a game session.
///
/// Events are returned by `GameSession` operations and broadcast by the
/// runtime to the presentation layer. An operation that returns no events
/// changed nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GameEvent {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// A fresh card was dealt, by starting a game or asking for a new card.
    GameStarted {
        card_id: Uuid,
        category: String,
        timestamp: DateTime<Utc>,
    },

    /// The session went back to idle and discarded its card.
    GameReset { timestamp: DateTime<Utc> },

    /// A line was completed.
    Bingo {
        line: WinningLine,
        word: String,
        filled_count: usize,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Squares
    // =========================================================================
    SquareFilled {
        row: usize,
        col: usize,
        word: String,
        source: FillSource,
        filled_count: usize,
    },

    SquareCleared {
        row: usize,
        col: usize,
        word: String,
        filled_count: usize,
    },

    /// A mutation arrived after the game was won and was discarded.
    MutationRejected { source: FillSource, word: Option<String> },

    // =========================================================================
    // Speech
    // =========================================================================
    /// A card word (or one of its aliases) was heard in a final fragment.
    WordDetected { word: String },

    /// Display-only partial transcript. Never affects the grid.
    InterimTranscript { text: String },

    /// A finalized transcript fragment that was run through the matcher.
    FinalTranscript { text: String },

    ListeningStarted { generation: u64 },

    ListeningStopped {
        generation: u64,
        reason: Option<String>,
    },
}

impl GameEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::GameReset { .. } => "game_reset",
            GameEvent::Bingo { .. } => "bingo",
            GameEvent::SquareFilled { .. } => "square_filled",
            GameEvent::SquareCleared { .. } => "square_cleared",
            GameEvent::MutationRejected { .. } => "mutation_rejected",
            GameEvent::WordDetected { .. } => "word_detected",
            GameEvent::InterimTranscript { .. } => "interim_transcript",
            GameEvent::FinalTranscript { .. } => "final_transcript",
            GameEvent::ListeningStarted { .. } => "listening_started",
            GameEvent::ListeningStopped { .. } => "listening_stopped",
        }
    }

    /// Whether this event reflects a change to the persisted game record.
    pub fn changes_record(&self) -> bool {
        matches!(
            self,
            GameEvent::GameStarted { .. }
                | GameEvent::GameReset { .. }
                | GameEvent::Bingo { .. }
                | GameEvent::SquareFilled { .. }
                | GameEvent::SquareCleared { .. }
        )
    }
}
