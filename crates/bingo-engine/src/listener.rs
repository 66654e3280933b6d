//! Speech source subscription.
//!
//! The speech engine is an external collaborator that delivers interim and
//! final transcript fragments and may end spontaneously (continuous
//! recognisers time out on silence). `Subscription` owns at most one
//! running source at a time. A pump task forwards the source's fragments to
//! the session runtime, restarting the source after spurious end events.
//!
//! Every start gets a new generation number. Fragments are tagged with the
//! generation they came from and the runtime drops any whose generation is
//! no longer active, so nothing reaches the grid after `stop` returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use bingo_core::error::{BingoError, Result};

use crate::runtime::Command;

/// Something the speech engine reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Transcribed text. Only final fragments are matched against the card.
    Fragment { text: String, is_final: bool },
    /// The engine stopped on its own and should be restarted.
    Ended,
    /// The engine failed; listening stops.
    Error(String),
}

/// A continuous speech-to-text engine.
#[async_trait]
pub trait SpeechSource: Send {
    /// Begin (or resume) recognition.
    async fn start(&mut self) -> Result<()>;

    /// Next event from the engine. `None` means the source is gone for good.
    async fn next_event(&mut self) -> Option<SpeechEvent>;

    /// Stop recognition. Called once when the subscription ends.
    async fn stop(&mut self);
}

/// Manages the single active speech source.
#[derive(Debug, Default)]
pub struct Subscription {
    generation: u64,
    active: Option<ActiveListener>,
}

#[derive(Debug)]
struct ActiveListener {
    generation: u64,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the running source, if any.
    pub fn current(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Whether a fragment tagged with `generation` may be applied.
    pub fn accepts(&self, generation: u64) -> bool {
        self.current() == Some(generation)
    }

    /// Start pumping `source` into `sink`.
    ///
    /// Returns the new generation, or `None` (dropping `source`) if a source
    /// is already running.
    pub(crate) fn start(
        &mut self,
        source: Box<dyn SpeechSource>,
        sink: mpsc::Sender<Command>,
        max_restarts: u32,
    ) -> Option<u64> {
        if let Some(active) = &self.active {
            tracing::debug!(generation = active.generation, "Already listening");
            return None;
        }

        self.generation += 1;
        let generation = self.generation;
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(pump(
            source,
            generation,
            sink,
            Arc::clone(&stop),
            max_restarts,
        ));
        tracing::info!(generation, "Listening started");
        self.active = Some(ActiveListener {
            generation,
            stop,
            task,
        });
        Some(generation)
    }

    /// Stop the running source. Idempotent; returns the stopped generation.
    pub fn stop(&mut self) -> Option<u64> {
        let active = self.active.take()?;
        active.stop.notify_one();
        tracing::info!(generation = active.generation, "Listening stopped");
        Some(active.generation)
    }

    /// The pump for `generation` exited on its own. Returns whether that was
    /// the active source.
    pub fn finished(&mut self, generation: u64) -> bool {
        if self.accepts(generation) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.notify_one();
            active.task.abort();
        }
    }
}

async fn pump(
    mut source: Box<dyn SpeechSource>,
    generation: u64,
    sink: mpsc::Sender<Command>,
    stop: Arc<Notify>,
    max_restarts: u32,
) {
    if let Err(e) = source.start().await {
        tracing::warn!(generation, error = %e, "Speech source failed to start");
        let _ = sink
            .send(Command::ListenerEnded {
                generation,
                reason: Some(e.to_string()),
            })
            .await;
        return;
    }

    let mut restarts = 0u32;
    let reason = loop {
        let event = tokio::select! {
            biased;
            _ = stop.notified() => {
                source.stop().await;
                return;
            }
            event = source.next_event() => event,
        };

        match event {
            Some(SpeechEvent::Fragment { text, is_final }) => {
                restarts = 0;
                let command = Command::Fragment {
                    generation: Some(generation),
                    text,
                    is_final,
                };
                if sink.send(command).await.is_err() {
                    break None;
                }
            }
            Some(SpeechEvent::Ended) => {
                if restarts >= max_restarts {
                    break Some(format!(
                        "speech source ended {} times without producing text",
                        restarts + 1
                    ));
                }
                restarts += 1;
                tracing::debug!(generation, restarts, "Speech source ended, restarting");
                if let Err(e) = source.start().await {
                    break Some(e.to_string());
                }
            }
            Some(SpeechEvent::Error(message)) => {
                tracing::warn!(generation, error = %message, "Speech source error");
                break Some(message);
            }
            None => break None,
        }
    };

    source.stop().await;
    let _ = sink
        .send(Command::ListenerEnded { generation, reason })
        .await;
}

// =============================================================================
// Channel-backed source
// =============================================================================

/// A `SpeechSource` fed through a channel.
///
/// Adapters for real engines (or a terminal) push events through the
/// paired `SpeechFeed`.
#[derive(Debug)]
pub struct ChannelSpeechSource {
    events: mpsc::Receiver<SpeechEvent>,
    starts: Arc<AtomicUsize>,
}

/// Sending half of a `ChannelSpeechSource`.
#[derive(Debug, Clone)]
pub struct SpeechFeed {
    events: mpsc::Sender<SpeechEvent>,
    starts: Arc<AtomicUsize>,
}

impl ChannelSpeechSource {
    pub fn new(buffer: usize) -> (Self, SpeechFeed) {
        let (tx, rx) = mpsc::channel(buffer);
        let starts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                events: rx,
                starts: Arc::clone(&starts),
            },
            SpeechFeed { events: tx, starts },
        )
    }
}

#[async_trait]
impl SpeechSource for ChannelSpeechSource {
    async fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SpeechEvent> {
        self.events.recv().await
    }

    async fn stop(&mut self) {
        self.events.close();
    }
}

impl SpeechFeed {
    pub async fn send(&self, event: SpeechEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| BingoError::Listener("speech source is not listening".to_string()))
    }

    pub async fn interim(&self, text: impl Into<String>) -> Result<()> {
        self.send(SpeechEvent::Fragment {
            text: text.into(),
            is_final: false,
        })
        .await
    }

    pub async fn final_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(SpeechEvent::Fragment {
            text: text.into(),
            is_final: true,
        })
        .await
    }

    /// How many times the source has been (re)started.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn recv(rx: &mut mpsc::Receiver<Command>) -> Command {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for command")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_fragments_are_tagged_with_generation() {
        let (tx, mut rx) = mpsc::channel(16);
        let (source, feed) = ChannelSpeechSource::new(16);
        let mut sub = Subscription::new();

        let generation = sub.start(Box::new(source), tx, 3).unwrap();
        assert_eq!(generation, 1);
        assert!(sub.current().is_some());

        feed.final_text("hello synergy").await.unwrap();
        match recv(&mut rx).await {
            Command::Fragment {
                generation: g,
                text,
                is_final,
            } => {
                assert_eq!(g, Some(1));
                assert_eq!(text, "hello synergy");
                assert!(is_final);
            }
            _ => panic!("expected fragment"),
        }
    }

    #[tokio::test]
    async fn test_single_active_listener() {
        let (tx, _rx) = mpsc::channel(16);
        let (a, _feed_a) = ChannelSpeechSource::new(4);
        let (b, _feed_b) = ChannelSpeechSource::new(4);
        let mut sub = Subscription::new();

        assert_eq!(sub.start(Box::new(a), tx.clone(), 3), Some(1));
        assert_eq!(sub.start(Box::new(b), tx, 3), None);
        assert_eq!(sub.current(), Some(1));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_closes_source() {
        let (tx, _rx) = mpsc::channel(16);
        let (source, feed) = ChannelSpeechSource::new(4);
        let mut sub = Subscription::new();

        sub.start(Box::new(source), tx, 3);
        assert_eq!(sub.stop(), Some(1));
        assert_eq!(sub.stop(), None);
        assert!(!sub.accepts(1));

        tokio::time::timeout(Duration::from_secs(2), async {
            while !feed.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("source should be closed after stop");
        assert!(feed.final_text("too late").await.is_err());
    }

    #[tokio::test]
    async fn test_restart_generation_increments() {
        let (tx, _rx) = mpsc::channel(16);
        let mut sub = Subscription::new();
        let (a, _fa) = ChannelSpeechSource::new(4);
        let (b, _fb) = ChannelSpeechSource::new(4);

        assert_eq!(sub.start(Box::new(a), tx.clone(), 3), Some(1));
        sub.stop();
        assert_eq!(sub.start(Box::new(b), tx, 3), Some(2));
        assert!(sub.accepts(2));
        assert!(!sub.accepts(1));
    }

    #[tokio::test]
    async fn test_spurious_end_restarts_source() {
        let (tx, mut rx) = mpsc::channel(16);
        let (source, feed) = ChannelSpeechSource::new(16);
        let mut sub = Subscription::new();
        sub.start(Box::new(source), tx, 3);

        feed.send(SpeechEvent::Ended).await.unwrap();
        feed.send(SpeechEvent::Ended).await.unwrap();
        feed.final_text("still here").await.unwrap();

        assert!(matches!(recv(&mut rx).await, Command::Fragment { .. }));
        assert_eq!(feed.start_count(), 3);
    }

    #[tokio::test]
    async fn test_restart_budget_exhausted_ends_listener() {
        let (tx, mut rx) = mpsc::channel(16);
        let (source, feed) = ChannelSpeechSource::new(16);
        let mut sub = Subscription::new();
        sub.start(Box::new(source), tx, 1);

        feed.send(SpeechEvent::Ended).await.unwrap();
        feed.send(SpeechEvent::Ended).await.unwrap();

        match recv(&mut rx).await {
            Command::ListenerEnded { generation, reason } => {
                assert_eq!(generation, 1);
                assert!(reason.unwrap().contains("ended"));
            }
            _ => panic!("expected ListenerEnded"),
        }
        assert!(sub.finished(1));
        assert!(sub.current().is_none());
    }

    #[tokio::test]
    async fn test_error_ends_listener_with_reason() {
        let (tx, mut rx) = mpsc::channel(16);
        let (source, feed) = ChannelSpeechSource::new(16);
        let mut sub = Subscription::new();
        sub.start(Box::new(source), tx, 3);

        feed.send(SpeechEvent::Error("not-allowed".into()))
            .await
            .unwrap();
        match recv(&mut rx).await {
            Command::ListenerEnded { reason, .. } => {
                assert_eq!(reason.as_deref(), Some("not-allowed"));
            }
            _ => panic!("expected ListenerEnded"),
        }
    }

    #[tokio::test]
    async fn test_finished_ignores_stale_generation() {
        let mut sub = Subscription::new();
        assert!(!sub.finished(7));
    }
}
