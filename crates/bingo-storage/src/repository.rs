//! Game record repository.
//!
//! Stores the JSON-serialized `GameRecord` under a slot key, one row per
//! slot, so the current game survives a restart.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::OptionalExtension;

use bingo_core::error::BingoError;
use bingo_core::store::GameStore;
use bingo_core::types::GameRecord;

use crate::db::Database;

/// Slot used when none is given.
pub const DEFAULT_SLOT: &str = "meeting-bingo-game";

/// SQLite-backed `GameStore`.
pub struct GameRepository {
    db: Arc<Database>,
    slot: String,
}

impl GameRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_slot(db, DEFAULT_SLOT)
    }

    pub fn with_slot(db: Arc<Database>, slot: impl Into<String>) -> Self {
        Self {
            db,
            slot: slot.into(),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// When the slot was last written, as Unix seconds.
    pub fn updated_at(&self) -> Result<Option<i64>, BingoError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT updated_at FROM game_state WHERE slot = ?1",
                rusqlite::params![self.slot],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BingoError::Storage(e.to_string()))
        })
    }
}

impl GameStore for GameRepository {
    fn save(&self, record: &GameRecord) -> Result<(), BingoError> {
        let json = serde_json::to_string(record)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO game_state (slot, record, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(slot) DO UPDATE SET
                    record = excluded.record,
                    updated_at = excluded.updated_at",
                rusqlite::params![self.slot, json, Utc::now().timestamp()],
            )
            .map_err(|e| BingoError::Storage(format!("Failed to save game: {}", e)))?;
            Ok(())
        })?;
        tracing::debug!(slot = %self.slot, status = %record.status, "Game saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<GameRecord>, BingoError> {
        let json: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT record FROM game_state WHERE slot = ?1",
                rusqlite::params![self.slot],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BingoError::Storage(format!("Failed to load game: {}", e)))
        })?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), BingoError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM game_state WHERE slot = ?1",
                rusqlite::params![self.slot],
            )
            .map_err(|e| BingoError::Storage(format!("Failed to clear game: {}", e)))?;
            Ok(())
        })?;
        tracing::debug!(slot = %self.slot, "Game cleared");
        Ok(())
    }
}
