//! Game session state machine.
//!
//! `GameSession` owns the current card and is the single place where grid
//! mutations are committed. Every operation reads the current state,
//! computes the next card with the pure `grid` functions, re-checks for a
//! win and commits. Once the game is won, mutation entry points refuse to
//! touch the card, since speech detections can still arrive after the
//! winning move.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;

use bingo_core::category::{Category, CategoryCatalog};
use bingo_core::error::{BingoError, Result};
use bingo_core::events::{FillSource, GameEvent};
use bingo_core::types::{
    Card, GameRecord, GameStatus, LineKind, WinningLine, CENTER, GRID_SIZE, WORDS_PER_CARD,
};

use crate::card::CardGenerator;
use crate::grid;
use crate::matcher::WordMatcher;
use crate::state::validate_transition;
use crate::win;

/// A single player's game: status, card, counters and the win latch.
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    status: GameStatus,
    category: Option<Category>,
    card: Option<Card>,
    matcher: WordMatcher,
    filled_count: usize,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    winning_line: Option<WinningLine>,
    winning_word: Option<String>,
}

impl GameSession {
    /// A new session in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    /// Filled squares including the free space; 0 while idle.
    pub fn filled_count(&self) -> usize {
        self.filled_count
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn winning_line(&self) -> Option<&WinningLine> {
        self.winning_line.as_ref()
    }

    pub fn winning_word(&self) -> Option<&str> {
        self.winning_word.as_deref()
    }

    /// Case-folded words already credited: every filled, non-free square.
    pub fn matched_words(&self) -> HashSet<String> {
        self.card
            .as_ref()
            .map(Card::filled_words)
            .unwrap_or_default()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a game with `category`. Only valid from idle.
    pub fn start(&mut self, category: &Category) -> Result<Vec<GameEvent>> {
        self.start_with_rng(category, &mut rand::rng())
    }

    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        category: &Category,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>> {
        if self.status != GameStatus::Idle {
            return Err(BingoError::InvalidTransition {
                from: self.status,
                to: GameStatus::Playing,
            });
        }
        let card = CardGenerator::new().generate_with_rng(category, rng)?;
        validate_transition(self.status, GameStatus::Playing)?;
        Ok(vec![self.deal(category.clone(), card)])
    }

    /// Replace the card with a fresh one from the same category, clearing
    /// counters, timestamps, detections and any win.
    pub fn new_card(&mut self) -> Result<Vec<GameEvent>> {
        self.new_card_with_rng(&mut rand::rng())
    }

    pub fn new_card_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<GameEvent>> {
        let category = self.category.clone().ok_or(BingoError::NoActiveGame)?;
        validate_transition(self.status, GameStatus::Playing)?;
        let card = CardGenerator::new().generate_with_rng(&category, rng)?;
        Ok(vec![self.deal(category, card)])
    }

    /// Return to idle, discarding the card. Idempotent.
    pub fn reset(&mut self) -> Vec<GameEvent> {
        if self.status == GameStatus::Idle {
            return Vec::new();
        }
        tracing::info!(from = %self.status, "Game reset");
        *self = Self::new();
        vec![GameEvent::GameReset {
            timestamp: Utc::now(),
        }]
    }

    fn deal(&mut self, category: Category, card: Card) -> GameEvent {
        let now = Utc::now();
        self.matcher = WordMatcher::new(&card.words, &category.aliases);
        self.status = GameStatus::Playing;
        self.filled_count = card.filled_count();
        self.started_at = Some(now);
        self.completed_at = None;
        self.winning_line = None;
        self.winning_word = None;

        let event = GameEvent::GameStarted {
            card_id: card.id,
            category: category.id.clone(),
            timestamp: now,
        };
        tracing::info!(card_id = %card.id, category = %category.id, "Game started");
        self.card = Some(card);
        self.category = Some(category);
        event
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Player tapped the square at `(row, col)`.
    ///
    /// Ignored while idle, for the free space and out-of-range cells.
    /// After a win the card is left untouched and a `MutationRejected`
    /// event is returned.
    pub fn toggle_manual(&mut self, row: usize, col: usize) -> Vec<GameEvent> {
        let Some(card) = self.card.as_ref() else {
            tracing::debug!(row, col, "Toggle ignored: no active game");
            return Vec::new();
        };
        if self.status == GameStatus::Won {
            let word = card.square(row, col).map(|s| s.word.clone());
            return vec![GameEvent::MutationRejected {
                source: FillSource::Manual,
                word,
            }];
        }

        let next = match grid::try_toggle_manual(card, row, col) {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(row, col, reason = %e, "Manual toggle ignored");
                return Vec::new();
            }
        };
        self.commit(next, row, col, FillSource::Manual)
    }

    /// Fill the square holding `word` as if it had been heard.
    pub fn auto_fill(&mut self, word: &str) -> Vec<GameEvent> {
        let Some(card) = self.card.as_ref() else {
            tracing::debug!(word, "Auto-fill ignored: no active game");
            return Vec::new();
        };
        if self.status == GameStatus::Won {
            tracing::debug!(word, "Auto-fill rejected: game already won");
            return vec![GameEvent::MutationRejected {
                source: FillSource::Speech,
                word: Some(word.to_string()),
            }];
        }

        let next = match grid::try_auto_fill(card, word) {
            Ok(next) => next,
            Err(e @ grid::GridError::UnmatchedWord(_)) => {
                tracing::warn!(word, reason = %e, "Detected word has no square");
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!(word, reason = %e, "Auto-fill ignored");
                return Vec::new();
            }
        };
        let Some((row, col)) = next.find_word(word) else {
            return Vec::new();
        };
        self.commit(next, row, col, FillSource::Speech)
    }

    /// Run a finalized transcript fragment through the matcher and
    /// auto-fill every newly detected word in order.
    ///
    /// After a win the matcher still runs, but each detection comes back as
    /// a rejected mutation. A win part-way through a fragment rejects the
    /// remaining detections the same way.
    pub fn on_final_fragment(&mut self, text: &str) -> Vec<GameEvent> {
        if self.card.is_none() {
            return Vec::new();
        }

        let detected = self.detect(text);
        let mut events = Vec::new();
        for word in detected {
            tracing::debug!(word = %word, "Word detected");
            events.push(GameEvent::WordDetected { word: word.clone() });
            events.extend(self.auto_fill(&word));
        }
        events
    }

    /// Card words newly heard in `text`, without applying them.
    pub fn detect(&self, text: &str) -> Vec<String> {
        self.matcher.detect(text, &self.matched_words())
    }

    fn commit(&mut self, next: Card, row: usize, col: usize, source: FillSource) -> Vec<GameEvent> {
        let square = &next.squares[row][col];
        let word = square.word.clone();
        let filled_count = next.filled_count();

        let mut events = vec![if square.is_filled {
            GameEvent::SquareFilled {
                row,
                col,
                word: word.clone(),
                source,
                filled_count,
            }
        } else {
            GameEvent::SquareCleared {
                row,
                col,
                word: word.clone(),
                filled_count,
            }
        }];

        let line = win::check(&next);
        self.card = Some(next);
        self.filled_count = filled_count;

        if let Some(line) = line {
            if validate_transition(self.status, GameStatus::Won).is_ok() {
                let now = Utc::now();
                tracing::info!(line = %line.kind, word = %word, filled_count, "Bingo!");
                self.status = GameStatus::Won;
                self.completed_at = Some(now);
                self.winning_word = Some(word.clone());
                self.winning_line = Some(line.clone());
                events.push(GameEvent::Bingo {
                    line,
                    word,
                    filled_count,
                    timestamp: now,
                });
            }
        }
        events
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Flat snapshot of the session.
    pub fn record(&self) -> GameRecord {
        GameRecord {
            status: self.status,
            category: self.category.as_ref().map(|c| c.id.clone()),
            card: self.card.clone(),
            filled_count: self.filled_count,
            started_at: self.started_at,
            completed_at: self.completed_at,
            winning_line: self.winning_line.clone(),
            winning_word: self.winning_word.clone(),
        }
    }

    /// Rebuild a session from a saved record.
    ///
    /// The category is resolved through `catalog` to recover its aliases.
    /// Records that break the session invariants are rejected.
    pub fn from_record(record: GameRecord, catalog: &CategoryCatalog) -> Result<Self> {
        match record.status {
            GameStatus::Idle => {
                if record.card.is_some() {
                    return Err(BingoError::Serialization(
                        "idle game record must not hold a card".to_string(),
                    ));
                }
                Ok(Self::new())
            }
            GameStatus::Playing | GameStatus::Won => {
                let card = record.card.ok_or_else(|| {
                    BingoError::Serialization(format!("{} game record has no card", record.status))
                })?;
                check_card(&card)?;
                let category_id = record.category.unwrap_or_else(|| card.category.clone());
                let category = catalog.get(&category_id)?.clone();

                if let Some(line) = &record.winning_line {
                    check_line(line.kind)?;
                }
                if record.status == GameStatus::Won {
                    let line = record.winning_line.as_ref().ok_or_else(|| {
                        BingoError::Serialization("won game record has no winning line".to_string())
                    })?;
                    let complete = line
                        .kind
                        .cells()
                        .iter()
                        .all(|&(r, c)| card.squares[r][c].is_filled);
                    if !complete {
                        return Err(BingoError::Serialization(format!(
                            "winning {} is not fully filled",
                            line.kind
                        )));
                    }
                }

                let filled_count = card.filled_count();
                if filled_count != record.filled_count {
                    tracing::warn!(
                        saved = record.filled_count,
                        actual = filled_count,
                        "Saved fill count disagrees with card, using card"
                    );
                }

                Ok(Self {
                    status: record.status,
                    matcher: WordMatcher::new(&card.words, &category.aliases),
                    category: Some(category),
                    card: Some(card),
                    filled_count,
                    started_at: record.started_at,
                    completed_at: record.completed_at,
                    winning_line: record.winning_line,
                    winning_word: record.winning_word,
                })
            }
        }
    }
}

fn corrupt(reason: String) -> BingoError {
    BingoError::Serialization(format!("saved card is corrupt: {}", reason))
}

/// Structural checks on a deserialized card: positions, the single free
/// space and the word list.
fn check_card(card: &Card) -> Result<()> {
    let mut words = Vec::with_capacity(WORDS_PER_CARD);
    for (r, row) in card.squares.iter().enumerate() {
        for (c, square) in row.iter().enumerate() {
            if square.row != r || square.col != c {
                return Err(corrupt(format!(
                    "square at {}-{} claims position {}-{}",
                    r, c, square.row, square.col
                )));
            }
            let centre = r == CENTER && c == CENTER;
            if square.is_free_space != centre {
                return Err(corrupt(format!("unexpected free space layout at {}-{}", r, c)));
            }
            if centre {
                if !square.is_filled {
                    return Err(corrupt("free space is not filled".to_string()));
                }
            } else {
                words.push(square.word.as_str());
            }
        }
    }
    if card.words.iter().map(String::as_str).ne(words) {
        return Err(corrupt("word list does not match its squares".to_string()));
    }
    Ok(())
}

fn check_line(kind: LineKind) -> Result<()> {
    match kind {
        LineKind::Row(i) | LineKind::Column(i) if i >= GRID_SIZE => {
            Err(corrupt(format!("winning {} is off the card", kind)))
        }
        _ => Ok(()),
    }
}
