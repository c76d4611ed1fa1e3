//! Turn coordinator: the conversation state machine.
//!
//! The coordinator is the only writer of [`ConversationState`] and the only
//! owner of the pending question. It consumes [`ListenerEvent`]s from one
//! channel, so no flag is shared with the listener task:
//!
//! ```text
//! Idle -> Listening --(silence threshold, question pending)--> Speaking
//!            ^                                                    |
//!            +------- natural end -------------------------------+
//!            +------- Interrupted <-- recognized speech ----------+
//! ```
//!
//! The generator call runs inside the coordinator task. Events that arrive
//! while it is in flight are still drained: a new question is queued and
//! answered after the current one, nothing cancels the generation.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_core::config::VoiceConfig;
use parley_core::error::ParleyError;
use parley_core::ports::ResponseGenerator;
use parley_core::types::{ConversationState, PendingQuestion, SpeechRequest, UtteranceEvent};

use crate::citations::CitationDispatcher;
use crate::events::SessionEvent;
use crate::listener::ListenerEvent;
use crate::playback::{PlaybackController, PlaybackHandle};

/// The answer currently being spoken.
struct ActiveTurn {
    turn_id: Uuid,
    playback: PlaybackHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct TurnCoordinator {
    silence_threshold: u32,
    citation_notice: Option<String>,
    fallback_answer: String,
    unavailable_answer: String,
    generator: Arc<dyn ResponseGenerator>,
    playback: PlaybackController,
    citations: CitationDispatcher,
    state: watch::Sender<ConversationState>,
    events: broadcast::Sender<SessionEvent>,
    pending: PendingQuestion,
    /// Question heard while the generator was busy; becomes pending once the
    /// current answer is over.
    queued: Option<String>,
    active: Option<ActiveTurn>,
}

impl TurnCoordinator {
    pub fn new(
        config: &VoiceConfig,
        generator: Arc<dyn ResponseGenerator>,
        playback: PlaybackController,
        citations: CitationDispatcher,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConversationState::Idle);
        Self {
            silence_threshold: config.silence_ticks.max(1),
            citation_notice: config.citation_notice.clone(),
            fallback_answer: config.fallback_answer.clone(),
            unavailable_answer: config.unavailable_answer.clone(),
            generator,
            playback,
            citations,
            state,
            events,
            pending: PendingQuestion::new(),
            queued: None,
            active: None,
        }
    }

    pub fn state(&self) -> ConversationState {
        *self.state.borrow()
    }

    /// Read-only view of the conversation state for other components.
    pub fn watch_state(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    /// Drive the state machine until `shutdown` fires or the listener reports
    /// that the audio source is gone. Always ends in `Idle` with no playback.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ListenerEvent>, shutdown: CancellationToken) {
        info!(silence_threshold = self.silence_threshold, "Turn coordinator started");
        self.set_state(ConversationState::Listening);

        loop {
            let playing = self.active.as_ref().map(|t| t.playback.clone());
            let flow = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Flow::Stop,
                _ = playback_finished(playing) => {
                    self.on_playback_finished();
                    Flow::Continue
                }
                event = rx.recv() => match event {
                    Some(event) => self.handle(event, &mut rx, &shutdown).await,
                    None => {
                        warn!("Listener channel closed");
                        Flow::Stop
                    }
                },
            };

            if flow == Flow::Stop {
                break;
            }
        }

        self.stop();
        // Take the listener down too if it is still capturing.
        shutdown.cancel();
    }

    async fn handle(
        &mut self,
        event: ListenerEvent,
        rx: &mut mpsc::Receiver<ListenerEvent>,
        shutdown: &CancellationToken,
    ) -> Flow {
        match event {
            ListenerEvent::Utterance { utterance, question } => {
                self.on_utterance(utterance, question);
                Flow::Continue
            }
            ListenerEvent::Silence(_) => self.on_silence(rx, shutdown).await,
            ListenerEvent::SourceLost(reason) => {
                error!(%reason, "Audio source lost, ending session");
                Flow::Stop
            }
        }
    }

    fn on_utterance(&mut self, utterance: UtteranceEvent, question: Option<String>) {
        self.emit(SessionEvent::Heard {
            text: utterance.text,
            question: question.clone(),
        });

        // Any recognized speech while speaking preempts the answer.
        if self.active.is_some() {
            self.interrupt();
        }

        match question {
            Some(question) => {
                info!(question = %question, "Question buffered");
                self.pending.replace(question);
            }
            None => self.pending.reset_silence(),
        }
    }

    async fn on_silence(
        &mut self,
        rx: &mut mpsc::Receiver<ListenerEvent>,
        shutdown: &CancellationToken,
    ) -> Flow {
        if self.active.is_some() {
            return Flow::Continue;
        }
        if self.pending.is_empty() {
            self.pending.clear();
            return Flow::Continue;
        }

        let ticks = self.pending.tick();
        if ticks < self.silence_threshold {
            return Flow::Continue;
        }

        match self.pending.take() {
            Some(question) => self.dispatch(question, rx, shutdown).await,
            None => Flow::Continue,
        }
    }

    /// Answer `question` and start speaking. The pending buffer is already clear.
    async fn dispatch(
        &mut self,
        question: String,
        rx: &mut mpsc::Receiver<ListenerEvent>,
        shutdown: &CancellationToken,
    ) -> Flow {
        let turn_id = Uuid::new_v4();
        info!(%turn_id, question = %question, "Dispatching question");
        self.emit(SessionEvent::Dispatched {
            turn_id,
            question: question.clone(),
        });

        let generator = self.generator.clone();
        let generation = async move { generator.generate_answer(&question).await };
        tokio::pin!(generation);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(%turn_id, "Shutdown while generating, answer dropped");
                    return Flow::Stop;
                }
                result = &mut generation => break result,
                event = rx.recv() => match event {
                    Some(ListenerEvent::Utterance { utterance, question }) => {
                        self.on_utterance_while_generating(utterance, question);
                    }
                    Some(ListenerEvent::Silence(_)) => {}
                    Some(ListenerEvent::SourceLost(reason)) => {
                        error!(%turn_id, %reason, "Audio source lost while generating");
                        return Flow::Stop;
                    }
                    None => return Flow::Stop,
                },
            }
        };

        let (request, fallback) = match outcome {
            Ok(request) if !request.answer.trim().is_empty() => (request, false),
            Ok(_) => {
                warn!(%turn_id, "Generator returned an empty answer, using fallback");
                (SpeechRequest::new(self.fallback_answer.clone(), Vec::new()), true)
            }
            Err(ParleyError::GeneratorUnavailable(reason)) => {
                warn!(%turn_id, %reason, "Answer service unavailable, apologising");
                (SpeechRequest::new(self.unavailable_answer.clone(), Vec::new()), true)
            }
            Err(e) => {
                warn!(%turn_id, error = %e, "Generator failed, using fallback");
                (SpeechRequest::new(self.fallback_answer.clone(), Vec::new()), true)
            }
        };

        self.emit(SessionEvent::AnswerReady {
            turn_id,
            answer: request.answer.clone(),
            citations: request.citations.len(),
            fallback,
        });

        let spoken = self.spoken_answer(&request);
        self.citations.dispatch(request.citations);

        if let Some(previous) = self.active.take() {
            previous.playback.cancel();
        }
        let playback = self.playback.start(&spoken);
        self.active = Some(ActiveTurn { turn_id, playback });
        self.set_state(ConversationState::Speaking);
        Flow::Continue
    }

    fn on_utterance_while_generating(&mut self, utterance: UtteranceEvent, question: Option<String>) {
        self.emit(SessionEvent::Heard {
            text: utterance.text,
            question: question.clone(),
        });
        if let Some(question) = question {
            info!(question = %question, "Question queued behind the current answer");
            self.emit(SessionEvent::QuestionQueued {
                question: question.clone(),
            });
            self.queued = Some(question);
        }
    }

    fn spoken_answer(&self, request: &SpeechRequest) -> String {
        match &self.citation_notice {
            Some(notice) if request.has_citations() && self.citations.is_enabled() => {
                format!("{} {}", request.answer.trim_end(), notice)
            }
            _ => request.answer.clone(),
        }
    }

    fn interrupt(&mut self) {
        let Some(turn) = self.active.take() else {
            return;
        };
        turn.playback.cancel();
        info!(turn_id = %turn.turn_id, "Speech interrupted");
        self.emit(SessionEvent::Interrupted {
            turn_id: turn.turn_id,
        });
        self.set_state(ConversationState::Interrupted);
        self.resume_listening();
    }

    fn on_playback_finished(&mut self) {
        if let Some(turn) = self.active.take() {
            debug!(turn_id = %turn.turn_id, "Answer finished");
            self.resume_listening();
        }
    }

    fn resume_listening(&mut self) {
        match self.queued.take() {
            Some(question) => self.pending.replace(question),
            None => self.pending.reset_silence(),
        }
        self.set_state(ConversationState::Listening);
    }

    fn stop(&mut self) {
        if let Some(turn) = self.active.take() {
            turn.playback.cancel();
        }
        self.pending.clear();
        self.queued = None;
        self.set_state(ConversationState::Idle);
        info!("Turn coordinator stopped");
    }

    fn set_state(&self, state: ConversationState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "State changed");
            self.emit(SessionEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

async fn playback_finished(playback: Option<PlaybackHandle>) {
    match playback {
        Some(playback) => playback.finished().await,
        None => std::future::pending().await,
    }
}
