//! Bingo Engine crate - card dealing, transcript matching, grid mutation,
//! win detection and the serialized game session runtime.
//!
//! `GameSession` is the synchronous state machine. `SessionRuntime` wraps it
//! in a tokio task that applies manual taps and speech fragments one at a
//! time and broadcasts the resulting events.

pub mod card;
pub mod grid;
pub mod listener;
pub mod matcher;
pub mod runtime;
pub mod session;
pub mod state;
pub mod win;

pub use card::CardGenerator;
pub use grid::GridError;
pub use listener::{ChannelSpeechSource, SpeechEvent, SpeechFeed, SpeechSource, Subscription};
pub use matcher::{detect_words, tokenize, WordMatcher};
pub use runtime::{SessionHandle, SessionRuntime, SessionUpdate};
pub use session::GameSession;
