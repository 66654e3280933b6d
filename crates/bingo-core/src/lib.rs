//! Meeting Bingo core crate - domain types, word packs, events, configuration.

pub mod category;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;

pub use category::{Category, CategoryCatalog};
pub use config::BingoConfig;
pub use error::{BingoError, Result};
pub use events::{FillSource, GameEvent};
pub use store::GameStore;
pub use types::*;
