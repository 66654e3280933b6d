//! Serialized session runtime.
//!
//! `SessionRuntime` owns a `GameSession` on a single tokio task and applies
//! commands one at a time from an mpsc queue. Manual taps, speech fragments
//! and lifecycle commands therefore never interleave, and every mutation
//! reads the state left by the previous one.
//!
//! After each command that produced events, the runtime persists the record
//! (when a store is attached) and broadcasts a `SessionUpdate` to
//! subscribers.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use bingo_core::category::CategoryCatalog;
use bingo_core::error::{BingoError, Result};
use bingo_core::events::GameEvent;
use bingo_core::store::GameStore;
use bingo_core::types::GameRecord;

use crate::listener::{SpeechSource, Subscription};
use crate::session::GameSession;

const COMMAND_BUFFER: usize = 64;
const UPDATE_BUFFER: usize = 256;

/// Events produced by one command, with the record as it stands afterwards.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub events: Vec<GameEvent>,
    pub record: GameRecord,
}

type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) enum Command {
    Start {
        category: String,
        reply: Reply<GameRecord>,
    },
    NewCard {
        reply: Reply<GameRecord>,
    },
    Reset {
        reply: Reply<GameRecord>,
    },
    Toggle {
        row: usize,
        col: usize,
        reply: Reply<GameRecord>,
    },
    /// A transcript fragment. `generation` is set when it came through a
    /// listener subscription and `None` when submitted directly.
    Fragment {
        generation: Option<u64>,
        text: String,
        is_final: bool,
    },
    Listen {
        source: Box<dyn SpeechSource>,
        reply: Reply<bool>,
    },
    StopListening {
        reply: Reply<bool>,
    },
    ListenerEnded {
        generation: u64,
        reason: Option<String>,
    },
    Snapshot {
        reply: Reply<GameRecord>,
    },
    Shutdown,
}

/// The task that owns a game session.
pub struct SessionRuntime {
    session: GameSession,
    catalog: CategoryCatalog,
    store: Option<Arc<dyn GameStore>>,
    max_restarts: u32,
    subscription: Subscription,
}

impl SessionRuntime {
    pub fn new(session: GameSession, catalog: CategoryCatalog) -> Self {
        Self {
            session,
            catalog,
            store: None,
            max_restarts: 10,
            subscription: Subscription::new(),
        }
    }

    /// Persist the record after every state change.
    pub fn with_store(mut self, store: Arc<dyn GameStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// How many spontaneous speech-source endings are restarted in a row
    /// before listening gives up.
    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Spawn the runtime task and return a handle to it.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        let handle = SessionHandle {
            commands: tx.clone(),
            updates: updates.clone(),
        };
        let task = tokio::spawn(self.run(rx, tx.downgrade(), updates));
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        self_tx: mpsc::WeakSender<Command>,
        updates: broadcast::Sender<SessionUpdate>,
    ) {
        tracing::info!(status = %self.session.status(), "Session runtime started");

        while let Some(command) = commands.recv().await {
            let events = match command {
                Command::Start { category, reply } => {
                    let result = self
                        .catalog
                        .get(&category)
                        .cloned()
                        .and_then(|c| self.session.start(&c));
                    self.respond(result, reply)
                }
                Command::NewCard { reply } => {
                    let mut events = self.stop_listening();
                    let result = self.session.new_card();
                    events.extend(self.respond(result, reply));
                    events
                }
                Command::Reset { reply } => {
                    let mut events = self.stop_listening();
                    events.extend(self.session.reset());
                    let _ = reply.send(Ok(self.session.record()));
                    events
                }
                Command::Toggle { row, col, reply } => {
                    let events = self.session.toggle_manual(row, col);
                    let _ = reply.send(Ok(self.session.record()));
                    events
                }
                Command::Fragment {
                    generation,
                    text,
                    is_final,
                } => self.on_fragment(generation, text, is_final),
                Command::Listen { source, reply } => match self_tx.upgrade() {
                    Some(sink) => {
                        match self.subscription.start(source, sink, self.max_restarts) {
                            Some(generation) => {
                                let _ = reply.send(Ok(true));
                                vec![GameEvent::ListeningStarted { generation }]
                            }
                            None => {
                                let _ = reply.send(Ok(false));
                                Vec::new()
                            }
                        }
                    }
                    None => {
                        let _ = reply.send(Err(BingoError::ShuttingDown));
                        Vec::new()
                    }
                },
                Command::StopListening { reply } => {
                    let events = self.stop_listening();
                    let _ = reply.send(Ok(!events.is_empty()));
                    events
                }
                Command::ListenerEnded { generation, reason } => {
                    if self.subscription.finished(generation) {
                        tracing::info!(generation, reason = ?reason, "Listener ended");
                        vec![GameEvent::ListeningStopped { generation, reason }]
                    } else {
                        Vec::new()
                    }
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(Ok(self.session.record()));
                    Vec::new()
                }
                Command::Shutdown => break,
            };

            self.publish(events, &updates);
        }

        let events = self.stop_listening();
        self.publish(events, &updates);
        tracing::info!("Session runtime stopped");
    }

    fn respond(
        &self,
        result: Result<Vec<GameEvent>>,
        reply: Reply<GameRecord>,
    ) -> Vec<GameEvent> {
        match result {
            Ok(events) => {
                let _ = reply.send(Ok(self.session.record()));
                events
            }
            Err(e) => {
                tracing::debug!(error = %e, "Command rejected");
                let _ = reply.send(Err(e));
                Vec::new()
            }
        }
    }

    fn stop_listening(&mut self) -> Vec<GameEvent> {
        match self.subscription.stop() {
            Some(generation) => vec![GameEvent::ListeningStopped {
                generation,
                reason: None,
            }],
            None => Vec::new(),
        }
    }

    fn on_fragment(&mut self, generation: Option<u64>, text: String, is_final: bool) -> Vec<GameEvent> {
        if let Some(generation) = generation {
            if !self.subscription.accepts(generation) {
                tracing::debug!(generation, "Dropping fragment from stopped listener");
                return Vec::new();
            }
        }
        if text.trim().is_empty() {
            return Vec::new();
        }

        if is_final {
            let mut events = self.session.on_final_fragment(&text);
            events.insert(0, GameEvent::FinalTranscript { text });
            events
        } else {
            vec![GameEvent::InterimTranscript { text }]
        }
    }

    fn publish(&self, events: Vec<GameEvent>, updates: &broadcast::Sender<SessionUpdate>) {
        if events.is_empty() {
            return;
        }
        let record = self.session.record();

        if events.iter().any(GameEvent::changes_record) {
            if let Some(store) = &self.store {
                if let Err(e) = store.save(&record) {
                    tracing::warn!(error = %e, "Failed to persist game record");
                }
            }
        }

        // No subscribers is fine.
        let _ = updates.send(SessionUpdate { events, record });
    }
}

/// Cloneable handle for submitting commands to a running `SessionRuntime`.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionHandle {
    /// Receive every update published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| BingoError::ShuttingDown)?;
        rx.await.map_err(|_| BingoError::ShuttingDown)?
    }

    /// Start a game with the category `id`.
    pub async fn start(&self, category: impl Into<String>) -> Result<GameRecord> {
        let category = category.into();
        self.request(|reply| Command::Start { category, reply }).await
    }

    /// Deal a new card from the current category. Stops listening.
    pub async fn new_card(&self) -> Result<GameRecord> {
        self.request(|reply| Command::NewCard { reply }).await
    }

    /// Return to idle. Stops listening.
    pub async fn reset(&self) -> Result<GameRecord> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Toggle the square at `(row, col)`.
    pub async fn toggle(&self, row: usize, col: usize) -> Result<GameRecord> {
        self.request(|reply| Command::Toggle { row, col, reply })
            .await
    }

    /// Submit a final transcript fragment directly, outside any listener.
    pub async fn final_fragment(&self, text: impl Into<String>) -> Result<()> {
        self.fragment(text.into(), true).await
    }

    /// Submit an interim transcript fragment for display.
    pub async fn interim_fragment(&self, text: impl Into<String>) -> Result<()> {
        self.fragment(text.into(), false).await
    }

    async fn fragment(&self, text: String, is_final: bool) -> Result<()> {
        self.commands
            .send(Command::Fragment {
                generation: None,
                text,
                is_final,
            })
            .await
            .map_err(|_| BingoError::ShuttingDown)
    }

    /// Start listening on `source`. Returns `false` if already listening.
    pub async fn start_listening(&self, source: Box<dyn SpeechSource>) -> Result<bool> {
        self.request(|reply| Command::Listen { source, reply })
            .await
    }

    /// Stop listening. Returns `false` if nothing was listening.
    pub async fn stop_listening(&self) -> Result<bool> {
        self.request(|reply| Command::StopListening { reply })
            .await
    }

    /// Current record.
    pub async fn snapshot(&self) -> Result<GameRecord> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the runtime to stop. Commands already queued are still applied.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| BingoError::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use bingo_core::types::GameStatus;

    use crate::listener::{ChannelSpeechSource, SpeechEvent};

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<GameRecord>>,
    }

    impl GameStore for MemoryStore {
        fn save(&self, record: &GameRecord) -> Result<()> {
            self.saved.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn load(&self) -> Result<Option<GameRecord>> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        fn clear(&self) -> Result<()> {
            self.saved.lock().unwrap().clear();
            Ok(())
        }
    }

    fn runtime() -> SessionRuntime {
        SessionRuntime::new(GameSession::new(), CategoryCatalog::builtin())
    }

    async fn next_update(rx: &mut broadcast::Receiver<SessionUpdate>) -> SessionUpdate {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("update channel closed")
    }

    fn word_at(record: &GameRecord, row: usize, col: usize) -> String {
        record.card.as_ref().unwrap().squares[row][col].word.clone()
    }

    #[tokio::test]
    async fn test_start_and_toggle() {
        let (handle, _task) = runtime().spawn();
        let record = handle.start("agile").await.unwrap();
        assert_eq!(record.status, GameStatus::Playing);
        assert_eq!(record.filled_count, 1);

        let record = handle.toggle(0, 0).await.unwrap();
        assert_eq!(record.filled_count, 2);
        assert!(record.card.unwrap().squares[0][0].is_filled);
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let (handle, _task) = runtime().spawn();
        let err = handle.start("cooking").await.unwrap_err();
        assert!(matches!(err, BingoError::UnknownCategory(_)));
        assert_eq!(handle.snapshot().await.unwrap().status, GameStatus::Idle);
    }

    #[tokio::test]
    async fn test_direct_final_fragment_fills_square() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let record = handle.start("corporate").await.unwrap();
        let word = word_at(&record, 1, 1);
        next_update(&mut updates).await;

        handle
            .final_fragment(format!("we need more {} here", word))
            .await
            .unwrap();
        let update = next_update(&mut updates).await;
        assert!(matches!(update.events[0], GameEvent::FinalTranscript { .. }));
        assert!(update
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::SquareFilled { row: 1, col: 1, .. })));
        assert!(update.record.card.unwrap().squares[1][1].is_auto_filled);
    }

    #[tokio::test]
    async fn test_interim_fragment_does_not_fill() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let record = handle.start("tech").await.unwrap();
        let word = word_at(&record, 0, 0);
        next_update(&mut updates).await;

        handle.interim_fragment(word).await.unwrap();
        let update = next_update(&mut updates).await;
        assert_eq!(update.events.len(), 1);
        assert!(matches!(update.events[0], GameEvent::InterimTranscript { .. }));
        assert_eq!(update.record.filled_count, 1);
    }

    #[tokio::test]
    async fn test_listener_fragments_apply_until_stopped() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let record = handle.start("agile").await.unwrap();
        let first = word_at(&record, 0, 0);
        let second = word_at(&record, 4, 4);
        next_update(&mut updates).await;

        let (source, feed) = ChannelSpeechSource::new(8);
        assert!(handle.start_listening(Box::new(source)).await.unwrap());
        let update = next_update(&mut updates).await;
        assert!(matches!(
            update.events[0],
            GameEvent::ListeningStarted { generation: 1 }
        ));

        feed.final_text(first.clone()).await.unwrap();
        let update = next_update(&mut updates).await;
        assert_eq!(update.record.filled_count, 2);

        assert!(handle.stop_listening().await.unwrap());
        assert!(!handle.stop_listening().await.unwrap());
        let _ = feed.final_text(second).await;

        let record = handle.snapshot().await.unwrap();
        assert_eq!(record.filled_count, 2);
        assert!(!record.card.unwrap().squares[4][4].is_filled);
    }

    /// Queue a final fragment as the listener pump would tag it.
    async fn push_tagged(handle: &SessionHandle, generation: u64, text: String) {
        handle
            .commands
            .send(Command::Fragment {
                generation: Some(generation),
                text,
                is_final: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fragment_from_stopped_listener_is_dropped() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let record = handle.start("agile").await.unwrap();
        let word = word_at(&record, 0, 0);
        next_update(&mut updates).await;

        let (source, _feed) = ChannelSpeechSource::new(4);
        assert!(handle.start_listening(Box::new(source)).await.unwrap());
        next_update(&mut updates).await;
        assert!(handle.stop_listening().await.unwrap());
        let update = next_update(&mut updates).await;
        assert!(matches!(
            update.events[..],
            [GameEvent::ListeningStopped { generation: 1, reason: None }]
        ));

        push_tagged(&handle, 1, word).await;
        let after = handle.snapshot().await.unwrap();

        assert_eq!(after, record);
        assert!(matches!(
            updates.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_old_generation_dropped_while_new_listener_active() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let record = handle.start("agile").await.unwrap();
        let stale = word_at(&record, 0, 0);
        let fresh = word_at(&record, 4, 4);
        next_update(&mut updates).await;

        let (first, _f1) = ChannelSpeechSource::new(4);
        handle.start_listening(Box::new(first)).await.unwrap();
        handle.stop_listening().await.unwrap();
        let (second, _f2) = ChannelSpeechSource::new(4);
        assert!(handle.start_listening(Box::new(second)).await.unwrap());
        loop {
            let update = next_update(&mut updates).await;
            if matches!(
                update.events[..],
                [GameEvent::ListeningStarted { generation: 2 }]
            ) {
                break;
            }
        }

        push_tagged(&handle, 1, stale.clone()).await;
        push_tagged(&handle, 2, fresh.clone()).await;

        let update = next_update(&mut updates).await;
        assert_eq!(
            update.events[0],
            GameEvent::FinalTranscript { text: fresh.clone() }
        );
        let card = update.record.card.unwrap();
        let (row, col) = card.find_word(&stale).unwrap();
        assert!(!card.squares[row][col].is_filled);
        assert!(card.squares[4][4].is_filled);
        assert_eq!(update.record.filled_count, 2);
    }

    #[tokio::test]
    async fn test_second_listen_is_refused() {
        let (handle, _task) = runtime().spawn();
        let (a, _fa) = ChannelSpeechSource::new(4);
        let (b, _fb) = ChannelSpeechSource::new(4);
        assert!(handle.start_listening(Box::new(a)).await.unwrap());
        assert!(!handle.start_listening(Box::new(b)).await.unwrap());
    }

    #[tokio::test]
    async fn test_listener_error_publishes_stop_reason() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        let (source, feed) = ChannelSpeechSource::new(4);
        handle.start_listening(Box::new(source)).await.unwrap();
        next_update(&mut updates).await;

        feed.send(SpeechEvent::Error("network".into())).await.unwrap();
        let update = next_update(&mut updates).await;
        match &update.events[0] {
            GameEvent::ListeningStopped { generation, reason } => {
                assert_eq!(*generation, 1);
                assert_eq!(reason.as_deref(), Some("network"));
            }
            other => panic!("expected ListeningStopped, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_new_card_stops_listening() {
        let (handle, _task) = runtime().spawn();
        let mut updates = handle.subscribe();
        handle.start("agile").await.unwrap();
        let (source, _feed) = ChannelSpeechSource::new(4);
        handle.start_listening(Box::new(source)).await.unwrap();
        next_update(&mut updates).await;
        next_update(&mut updates).await;

        handle.new_card().await.unwrap();
        let update = next_update(&mut updates).await;
        assert!(matches!(
            update.events[0],
            GameEvent::ListeningStopped { .. }
        ));
        assert!(matches!(
            update.events.last(),
            Some(GameEvent::GameStarted { .. })
        ));
        assert!(!handle.stop_listening().await.unwrap());
    }

    #[tokio::test]
    async fn test_store_receives_changes() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = runtime().with_store(store.clone()).spawn();

        handle.start("corporate").await.unwrap();
        handle.toggle(3, 3).await.unwrap();
        handle.snapshot().await.unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.filled_count, 2);
        assert_eq!(store.saved.lock().unwrap().len(), 2);

        handle.reset().await.unwrap();
        handle.snapshot().await.unwrap();
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.status, GameStatus::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_ends_task() {
        let (handle, task) = runtime().spawn();
        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("runtime should stop")
            .unwrap();
        assert!(matches!(
            handle.snapshot().await,
            Err(BingoError::ShuttingDown)
        ));
    }
}
