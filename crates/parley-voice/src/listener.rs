//! Listener loop: captures phrases back to back and forwards typed events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use parley_core::config::VoiceConfig;
use parley_core::error::Result;
use parley_core::ports::SpeechRecognizer;
use parley_core::types::{RecognitionOutcome, UtteranceEvent};

use crate::wake::WakeWordGate;

/// What the listener tells the coordinator after each capture.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// Speech was recognized. `question` is the text after the wake phrase,
    /// `None` when the utterance was not addressed to the bot.
    Utterance {
        utterance: UtteranceEvent,
        question: Option<String>,
    },
    /// Nothing usable was heard in this capture window.
    Silence(RecognitionOutcome),
    /// The audio source is gone; no further events follow.
    SourceLost(String),
}

/// Continuously captures from a [`SpeechRecognizer`], gating each phrase.
pub struct Listener {
    recognizer: Arc<dyn SpeechRecognizer>,
    gate: WakeWordGate,
    capture_timeout: Duration,
    max_phrase: Duration,
    error_backoff: Duration,
}

impl Listener {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, gate: WakeWordGate, config: &VoiceConfig) -> Self {
        Self {
            recognizer,
            gate,
            capture_timeout: config.capture_timeout(),
            max_phrase: config.max_phrase(),
            error_backoff: config.error_backoff(),
        }
    }

    /// Capture until `cancel` fires, the audio source is lost, or the
    /// receiving side goes away. Keeps capturing while the bot speaks so
    /// that talking over it is noticed.
    pub async fn run(self, tx: mpsc::Sender<ListenerEvent>, cancel: CancellationToken) {
        info!(
            timeout_ms = self.capture_timeout.as_millis() as u64,
            max_phrase_ms = self.max_phrase.as_millis() as u64,
            "Listener started"
        );

        loop {
            let captured = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.capture() => r,
            };

            let event = match captured {
                Ok(event) => event,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Audio source lost, listener stopping");
                    let _ = tx.send(ListenerEvent::SourceLost(e.to_string())).await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Recognition failed, treating as silence");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                    ListenerEvent::Silence(RecognitionOutcome::Unintelligible)
                }
            };

            if tx.send(event).await.is_err() {
                debug!("Coordinator gone, listener stopping");
                break;
            }
        }

        info!("Listener stopped");
    }

    /// One capture attempt, gated.
    pub async fn capture(&self) -> Result<ListenerEvent> {
        let recognition = self
            .recognizer
            .recognize(self.capture_timeout, self.max_phrase)
            .await?;
        let utterance = UtteranceEvent::from_recognition(recognition);

        if !utterance.is_recognized() {
            trace!(outcome = ?utterance.outcome, "Silence");
            return Ok(ListenerEvent::Silence(utterance.outcome));
        }

        let question = self.gate.strip(&utterance.text);
        debug!(text = %utterance.text, addressed = question.is_some(), "Heard speech");
        Ok(ListenerEvent::Utterance { utterance, question })
    }
}
