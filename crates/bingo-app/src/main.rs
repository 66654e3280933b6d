//! Meeting Bingo binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the category catalog (built-in packs + config packs)
//! 3. Open the game store and restore the saved game
//! 4. Spawn the session runtime and print its updates
//! 5. Read player input from stdin until /quit or EOF

mod cli;
mod input;
mod render;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use bingo_core::category::CategoryCatalog;
use bingo_core::config::BingoConfig;
use bingo_core::error::BingoError;
use bingo_core::store::GameStore;
use bingo_core::types::{GameRecord, GameStatus};
use bingo_engine::{ChannelSpeechSource, GameSession, SessionRuntime, SessionUpdate, SpeechFeed};
use bingo_storage::{Database, GameRepository};

use cli::{expand_home, CliArgs, Command};
use input::{Input, HELP};

/// Open the SQLite-backed game store under the configured data directory.
fn open_store(config: &BingoConfig) -> Result<GameRepository, BingoError> {
    let data_dir = expand_home(&config.general.data_dir);
    let db_path = data_dir.join("meeting-bingo.db");
    let db = Database::new(&db_path)?;
    let store = GameRepository::new(Arc::new(db));
    tracing::info!(path = %db_path.display(), slot = store.slot(), "SQLite database opened");
    Ok(store)
}

fn print_record(record: &GameRecord) {
    if record.card.is_some() {
        println!("{}", render::card(record));
    }
    println!("{}", render::status(record));
}

fn list_categories(catalog: &CategoryCatalog) {
    for category in catalog.list() {
        println!("{}", render::category(category));
    }
}

fn show_status(config: &BingoConfig) -> Result<(), BingoError> {
    let store = open_store(config)?;
    match store.load()? {
        Some(record) => {
            print_record(&record);
            if let Some(line) = store.updated_at()?.and_then(render::saved_at) {
                println!("{}", line);
            }
        }
        None => println!("No saved game."),
    }
    Ok(())
}

fn clear_saved_game(config: &BingoConfig) -> Result<(), BingoError> {
    open_store(config)?.clear()?;
    println!("Saved game deleted.");
    Ok(())
}

/// Saved session, unless it is missing, unreadable or refers to a
/// category that no longer exists.
fn restore(store: &GameRepository, catalog: &CategoryCatalog) -> Option<GameSession> {
    let record = match store.load() {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "Saved game is unreadable, starting fresh");
            return None;
        }
    };
    match GameSession::from_record(record, catalog) {
        Ok(session) => {
            tracing::info!(status = %session.status(), "Saved game restored");
            Some(session)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Saved game cannot be resumed, starting fresh");
            None
        }
    }
}

/// A restored game is resumed unless the player asked for another category.
fn resumable(session: &GameSession, requested: Option<&str>) -> bool {
    let (Some(requested), Some(saved)) = (requested, session.category()) else {
        return true;
    };
    if saved.id.eq_ignore_ascii_case(requested) {
        return true;
    }
    println!(
        "Saved game is a {} card, dealing a new {} card instead.",
        saved.id, requested
    );
    false
}

/// Print every update from the runtime until it shuts down.
async fn print_updates(
    mut updates: broadcast::Receiver<SessionUpdate>,
    show_interim: bool,
    recent_detections: usize,
) {
    let mut recent = render::RecentWords::new(recent_detections);
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display fell behind, skipped updates");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut detected = false;
        for event in &update.events {
            recent.observe(event);
            detected |= matches!(event, bingo_core::events::GameEvent::WordDetected { .. });
            if let Some(line) = render::event_line(event, show_interim) {
                println!("{}", line);
            }
        }
        if update.events.iter().any(|e| e.changes_record()) {
            print_record(&update.record);
        }
        if detected {
            if let Some(line) = recent.line() {
                println!("{}", line);
            }
        }
    }
}

fn report<T>(result: Result<T, BingoError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(BingoError::ShuttingDown) => None,
        Err(e) => {
            println!("{}", e);
            None
        }
    }
}

async fn play(
    config: &BingoConfig,
    catalog: CategoryCatalog,
    category: Option<String>,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let requested = category;
    let category = requested
        .clone()
        .unwrap_or_else(|| config.game.default_category.clone());
    catalog.get(&category)?;

    let store = if config.game.persist {
        Some(Arc::new(open_store(config)?))
    } else {
        None
    };

    let session = match &store {
        Some(store) if !fresh => restore(store, &catalog),
        _ => None,
    }
    .filter(|session| resumable(session, requested.as_deref()))
    .unwrap_or_default();

    let mut runtime =
        SessionRuntime::new(session, catalog).with_max_restarts(config.speech.max_restarts);
    if let Some(store) = &store {
        runtime = runtime.with_store(Arc::clone(store) as Arc<dyn GameStore>);
    }
    let (handle, task) = runtime.spawn();
    let printer = tokio::spawn(print_updates(
        handle.subscribe(),
        config.speech.show_interim,
        config.game.recent_detections,
    ));

    let record = handle.snapshot().await?;
    if record.status == GameStatus::Idle {
        handle.start(category).await?;
    } else {
        print_record(&record);
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut feed: Option<SpeechFeed> = None;

    while let Some(line) = lines.next_line().await? {
        let input = match input::parse(&line) {
            Ok(input) => input,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match input {
            Input::Quit => break,
            Input::Empty => {}
            Input::Help => println!("{}", HELP),
            Input::Tap { row, col } => {
                report(handle.toggle(row, col).await);
            }
            Input::NewCard => {
                report(handle.new_card().await);
                feed = None;
            }
            Input::Reset => {
                report(handle.reset().await);
                feed = None;
            }
            Input::Listen => {
                let (source, next) = ChannelSpeechSource::new(64);
                match report(handle.start_listening(Box::new(source)).await) {
                    Some(true) => {
                        tracing::info!(
                            language = %config.speech.language,
                            "Typed transcript source attached"
                        );
                        feed = Some(next);
                    }
                    Some(false) => println!("Already listening."),
                    None => {}
                }
            }
            Input::Stop => {
                if report(handle.stop_listening().await) == Some(false) {
                    println!("Not listening.");
                }
                feed = None;
            }
            Input::Status => {
                if let Some(record) = report(handle.snapshot().await) {
                    print_record(&record);
                }
            }
            Input::Interim(text) | Input::Final(text) if feed.is_none() => {
                tracing::debug!(len = text.len(), "Transcript typed while not listening");
                println!("Not listening. Type /listen to start.");
            }
            Input::Interim(text) => {
                if let Some(f) = &feed {
                    if f.interim(text).await.is_err() {
                        feed = None;
                    }
                }
            }
            Input::Final(text) => {
                if let Some(f) = &feed {
                    if f.final_text(text).await.is_err() {
                        feed = None;
                        println!("Not listening. Type /listen to start.");
                    }
                }
            }
        }
    }

    drop(feed);
    handle.shutdown().await?;
    task.await?;
    drop(handle);
    printer.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = BingoConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    let log_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());

    // Tracing. Logs go to stderr so the card owns stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Meeting Bingo v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let catalog = config.catalog()?;

    match args.command() {
        Command::Categories => list_categories(&catalog),
        Command::Status => show_status(&config)?,
        Command::Reset => clear_saved_game(&config)?,
        Command::Play { category, fresh } => play(&config, catalog, category, fresh).await?,
    }

    Ok(())
}
