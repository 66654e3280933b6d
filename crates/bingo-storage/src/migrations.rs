//! Database schema migrations.
//!
//! Applies the schema_migrations tracking table and the game_state table
//! that holds the serialized game record per slot.

use rusqlite::Connection;
use tracing::info;

use bingo_core::error::BingoError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), BingoError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| BingoError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BingoError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: game_state");
    }

    Ok(())
}

/// Version 1: one JSON game record per slot.
fn apply_v1(conn: &Connection) -> Result<(), BingoError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS game_state (
            slot        TEXT PRIMARY KEY NOT NULL,
            record      TEXT NOT NULL CHECK (json_valid(record)),
            updated_at  INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'game_state');
        ",
    )
    .map_err(|e| BingoError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
