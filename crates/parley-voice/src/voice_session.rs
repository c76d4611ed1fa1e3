//! Voice session: wires the listener and the turn coordinator together.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_core::config::VoiceConfig;
use parley_core::ports::{CitationPoster, ResponseGenerator, SpeechRecognizer, SpeechSynthesizer};
use parley_core::types::ConversationState;

use crate::citations::CitationDispatcher;
use crate::coordinator::TurnCoordinator;
use crate::events::{EVENT_CHANNEL_CAPACITY, SessionEvent};
use crate::listener::Listener;
use crate::playback::PlaybackController;
use crate::wake::WakeWordGate;

/// Listener events buffered ahead of the coordinator.
const LISTENER_CHANNEL_CAPACITY: usize = 32;

/// The external capabilities a session drives.
#[derive(Clone)]
pub struct VoicePorts {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub generator: Arc<dyn ResponseGenerator>,
    /// Side channel for citation links; `None` disables posting.
    pub citations: Option<Arc<dyn CitationPoster>>,
}

/// Handle for controlling a running voice session from outside.
pub struct VoiceSessionHandle {
    /// Cancellation token to stop the session.
    pub cancel: CancellationToken,
    state: watch::Receiver<ConversationState>,
    events: broadcast::Sender<SessionEvent>,
    listener: JoinHandle<()>,
    coordinator: JoinHandle<()>,
}

impl VoiceSessionHandle {
    pub fn state(&self) -> ConversationState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConversationState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait for the session to end on its own, e.g. when the audio source is lost.
    pub async fn wait(self) {
        join("coordinator", self.coordinator).await;
        join("listener", self.listener).await;
    }

    /// Stop capturing and speaking, and wait for both tasks to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.wait().await;
    }
}

async fn join(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(task = name, error = %e, "Voice session task ended abnormally");
    }
}

/// A configured, not yet running voice session.
pub struct VoiceSession {
    listener: Listener,
    coordinator: TurnCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

impl VoiceSession {
    pub fn new(config: &VoiceConfig, ports: VoicePorts) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let gate = WakeWordGate::new(&config.wake_phrases);
        let listener = Listener::new(ports.recognizer, gate, config);

        let playback =
            PlaybackController::new(ports.synthesizer, config.output_device(), config.poll_interval());
        let citations = CitationDispatcher::new(ports.citations).with_events(events.clone());
        let coordinator =
            TurnCoordinator::new(config, ports.generator, playback, citations, events.clone());

        Self {
            listener,
            coordinator,
            events,
        }
    }

    /// Subscribe before `start()` to observe the very first state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Spawn the listener and coordinator tasks. Must be called from within a
    /// Tokio runtime.
    pub fn start(self) -> VoiceSessionHandle {
        let Self {
            listener,
            coordinator,
            events,
        } = self;
        let (tx, rx) = mpsc::channel(LISTENER_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let state = coordinator.watch_state();

        let listener = tokio::spawn(listener.run(tx, cancel.clone()));
        let coordinator = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                info!("Voice session started");
                coordinator.run(rx, cancel).await;
                info!("Voice session ended");
            }
        });

        VoiceSessionHandle {
            cancel,
            state,
            events,
            listener,
            coordinator,
        }
    }
}
