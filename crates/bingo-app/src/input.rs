//! Terminal input protocol.
//!
//! Lines starting with `/` are commands, `~text` is an interim transcript
//! fragment and anything else is a final fragment.

use thiserror::Error;

/// One parsed line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Tap { row: usize, col: usize },
    NewCard,
    Reset,
    Listen,
    Stop,
    Status,
    Help,
    Quit,
    Interim(String),
    Final(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Unknown command '/{0}'. Type /help for the list.")]
    UnknownCommand(String),

    #[error("Usage: /tap <row> <col> (0-4)")]
    TapUsage,
}

pub const HELP: &str = "\
Commands:
  /tap <row> <col>  toggle a square (0-4, 0-4)
  /new              deal a new card
  /reset            end the game
  /listen           start listening
  /stop             stop listening
  /status           show the card
  /quit             exit
While listening, type what people say: plain lines are final transcripts,
lines starting with ~ are interim.";

pub fn parse(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if let Some(text) = line.strip_prefix('~') {
        return Ok(Input::Interim(text.trim().to_string()));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Final(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    match name.as_str() {
        "tap" | "t" => {
            let row = parts.next().and_then(|s| s.parse().ok());
            let col = parts.next().and_then(|s| s.parse().ok());
            match (row, col, parts.next()) {
                (Some(row), Some(col), None) => Ok(Input::Tap { row, col }),
                _ => Err(InputError::TapUsage),
            }
        }
        "new" => Ok(Input::NewCard),
        "reset" => Ok(Input::Reset),
        "listen" => Ok(Input::Listen),
        "stop" => Ok(Input::Stop),
        "status" => Ok(Input::Status),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" | "q" => Ok(Input::Quit),
        _ => Err(InputError::UnknownCommand(name)),
    }
}
