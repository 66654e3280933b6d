//! Plain-text rendering of cards, status lines and game events.

use std::collections::VecDeque;

use chrono::DateTime;

use bingo_core::category::Category;
use bingo_core::events::GameEvent;
use bingo_core::types::{GameRecord, GameStatus, Square, WORDS_PER_CARD};

const CELL_WIDTH: usize = 18;

fn cell(square: &Square, winning: bool) -> String {
    if square.is_free_space {
        return format!("{:^width$}", "FREE", width = CELL_WIDTH);
    }
    let marker = match (square.is_filled, square.is_auto_filled) {
        (false, _) => "[ ]",
        (true, false) => "[x]",
        (true, true) => "[*]",
    };
    let limit = CELL_WIDTH - 4;
    let mut word: String = square.word.chars().take(limit).collect();
    if square.word.chars().count() > limit {
        word.pop();
        word.push('~');
    }
    if winning {
        word = word.to_uppercase();
    }
    format!("{} {:<width$}", marker, word, width = limit)
}

/// The card as a 5x5 grid. Squares on the winning line are upper-cased.
pub fn card(record: &GameRecord) -> String {
    let Some(card) = &record.card else {
        return String::from("(no card)");
    };

    let mut out = String::new();
    out.push_str("    ");
    for c in 0..card.squares.len() {
        out.push_str(&format!("{:<width$}", c, width = CELL_WIDTH + 1));
    }
    out.push('\n');

    for (r, row) in card.squares.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|sq| {
                let winning = record
                    .winning_line
                    .as_ref()
                    .is_some_and(|line| line.contains(sq.row, sq.col));
                cell(sq, winning)
            })
            .collect();
        out.push_str(&format!("{}   {}\n", r, cells.join("|")));
    }
    out
}

/// One-line summary of the game.
pub fn status(record: &GameRecord) -> String {
    match record.status {
        GameStatus::Idle => String::from("No game in progress."),
        GameStatus::Playing => format!(
            "{} | {}/{} filled",
            record.category.as_deref().unwrap_or("?"),
            record.filled_words_count(),
            WORDS_PER_CARD
        ),
        GameStatus::Won => {
            let line = record
                .winning_line
                .as_ref()
                .map(|l| l.kind.to_string())
                .unwrap_or_default();
            format!(
                "BINGO on {} after {} min, winning word: {} | {}/{} filled",
                line,
                record.elapsed_minutes(),
                record.winning_word.as_deref().unwrap_or("?"),
                record.filled_words_count(),
                WORDS_PER_CARD
            )
        }
    }
}

/// Message for an event, if it deserves one. Grid changes are shown by
/// re-rendering the card instead.
pub fn event_line(event: &GameEvent, show_interim: bool) -> Option<String> {
    match event {
        GameEvent::GameStarted { category, .. } => Some(format!("New {} card dealt.", category)),
        GameEvent::GameReset { .. } => Some(String::from("Game reset.")),
        GameEvent::Bingo { line, word, .. } => {
            Some(format!("*** BINGO! '{}' completed the {} ***", word, line.kind))
        }
        GameEvent::WordDetected { word } => Some(format!("Heard: {}", word)),
        GameEvent::MutationRejected { .. } => {
            Some(String::from("The game is over. Type /new for a new card."))
        }
        GameEvent::InterimTranscript { text } if show_interim => Some(format!("... {}", text)),
        GameEvent::ListeningStarted { .. } => Some(String::from("Listening.")),
        GameEvent::ListeningStopped { reason: None, .. } => {
            Some(String::from("Stopped listening."))
        }
        GameEvent::ListeningStopped {
            reason: Some(reason),
            ..
        } => Some(format!("Stopped listening: {}", reason)),
        _ => None,
    }
}

/// When a saved game was last written, from Unix seconds.
pub fn saved_at(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|at| format!("Last saved {}", at.format("%Y-%m-%d %H:%M UTC")))
}

/// Listing entry for a category pack.
pub fn category(category: &Category) -> String {
    format!(
        "{:<12} {} {} ({} words) - {}",
        category.id,
        category.icon,
        category.name,
        category.distinct_words().len(),
        category.description
    )
}

/// The most recently detected words, newest first.
#[derive(Debug)]
pub struct RecentWords {
    capacity: usize,
    words: VecDeque<String>,
}

impl RecentWords {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            words: VecDeque::with_capacity(capacity),
        }
    }

    /// Track detections; a new card or reset clears the list.
    pub fn observe(&mut self, event: &GameEvent) {
        match event {
            GameEvent::WordDetected { word } if self.capacity > 0 => {
                self.words.push_front(word.clone());
                self.words.truncate(self.capacity);
            }
            GameEvent::GameStarted { .. } | GameEvent::GameReset { .. } => self.words.clear(),
            _ => {}
        }
    }

    pub fn line(&self) -> Option<String> {
        if self.words.is_empty() {
            return None;
        }
        let words: Vec<&str> = self.words.iter().map(String::as_str).collect();
        Some(format!("Recent: {}", words.join(", ")))
    }
}
