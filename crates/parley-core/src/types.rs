use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Turn-taking state of a voice session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Before the session starts and after it stops.
    #[default]
    Idle,
    Listening,
    Speaking,
    /// Transient: playback was preempted, re-entering `Listening`.
    Interrupted,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// What a speech-to-text port returns for one capture window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Recognized(String),
    /// Nobody spoke before the capture timeout.
    Timeout,
    /// Audio was captured but could not be transcribed.
    Unintelligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionOutcome {
    Recognized,
    Timeout,
    Unintelligible,
}

/// One capture attempt as seen by the listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtteranceEvent {
    /// Recognized text, empty unless `outcome` is `Recognized`.
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub outcome: RecognitionOutcome,
}

impl UtteranceEvent {
    pub fn from_recognition(recognition: Recognition) -> Self {
        let (text, outcome) = match recognition {
            Recognition::Recognized(text) => {
                let text = text.trim().to_string();
                // An engine that returns only whitespace heard nothing usable.
                if text.is_empty() {
                    (text, RecognitionOutcome::Unintelligible)
                } else {
                    (text, RecognitionOutcome::Recognized)
                }
            }
            Recognition::Timeout => (String::new(), RecognitionOutcome::Timeout),
            Recognition::Unintelligible => (String::new(), RecognitionOutcome::Unintelligible),
        };
        Self {
            text,
            received_at: Utc::now(),
            outcome,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.outcome == RecognitionOutcome::Recognized
    }
}

/// The question waiting for the silence-confirmation window to elapse.
///
/// A new qualifying utterance overwrites the text; it is never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQuestion {
    text: Option<String>,
    silence_ticks: u32,
}

impl PendingQuestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffered question and restart the silence count.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
        self.silence_ticks = 0;
    }

    /// Count one more silent capture and return the running total.
    pub fn tick(&mut self) -> u32 {
        self.silence_ticks = self.silence_ticks.saturating_add(1);
        self.silence_ticks
    }

    /// Treat the last capture as activity.
    pub fn reset_silence(&mut self) {
        self.silence_ticks = 0;
    }

    pub fn silence_ticks(&self) -> u32 {
        self.silence_ticks
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// A wake phrase with nothing after it leaves an empty question behind;
    /// that counts as empty here.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }

    /// Take the question out, leaving the buffer cleared.
    pub fn take(&mut self) -> Option<String> {
        self.silence_ticks = 0;
        self.text.take().filter(|t| !t.trim().is_empty())
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.silence_ticks = 0;
    }
}

/// An answer ready to be spoken, with the links that back it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

impl SpeechRequest {
    pub fn new(answer: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            answer: answer.into(),
            citations,
        }
    }

    pub fn has_citations(&self) -> bool {
        !self.citations.is_empty()
    }
}

/// Audio output the synthesizer renders into (e.g. a virtual cable feeding the call).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputDevice {
    pub name: String,
}

impl OutputDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
