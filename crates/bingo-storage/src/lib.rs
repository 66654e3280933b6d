//! Bingo Storage crate - SQLite persistence for the game record.
//!
//! Provides a WAL-mode SQLite database with migrations and a repository
//! that keeps the current game in a named slot so it survives restarts.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{GameRepository, DEFAULT_SLOT};
