//! Session events: what the voice session is doing, for observers.

use serde::Serialize;
use uuid::Uuid;

use parley_core::types::ConversationState;

/// Capacity of the session event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Emitted by a running voice session. Slow subscribers may miss events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        state: ConversationState,
    },
    /// Speech was recognized. `question` is set when it was addressed to the bot.
    Heard {
        text: String,
        question: Option<String>,
    },
    /// A question arrived while an answer was being generated; it is answered next.
    QuestionQueued {
        question: String,
    },
    Dispatched {
        turn_id: Uuid,
        question: String,
    },
    AnswerReady {
        turn_id: Uuid,
        answer: String,
        citations: usize,
        /// The generator failed and the fallback answer is used.
        fallback: bool,
    },
    /// Playback was preempted by new speech.
    Interrupted {
        turn_id: Uuid,
    },
    CitationsPosted {
        count: usize,
        success: bool,
    },
}

impl SessionEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Heard { .. } => "heard",
            Self::QuestionQueued { .. } => "question_queued",
            Self::Dispatched { .. } => "dispatched",
            Self::AnswerReady { .. } => "answer_ready",
            Self::Interrupted { .. } => "interrupted",
            Self::CitationsPosted { .. } => "citations_posted",
        }
    }
}
