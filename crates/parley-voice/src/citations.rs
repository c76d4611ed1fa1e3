//! Fire-and-forget citation posting, isolated from the speech path.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use parley_core::ports::CitationPoster;

use crate::events::SessionEvent;

/// Posts citation links on a task of their own.
#[derive(Clone, Default)]
pub struct CitationDispatcher {
    poster: Option<Arc<dyn CitationPoster>>,
    events: Option<broadcast::Sender<SessionEvent>>,
}

impl CitationDispatcher {
    pub fn new(poster: Option<Arc<dyn CitationPoster>>) -> Self {
        Self {
            poster,
            events: None,
        }
    }

    /// Report each posting outcome as a [`SessionEvent::CitationsPosted`].
    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether a side channel is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.poster.is_some()
    }

    /// Spawn a task that posts `citations` and swallows any failure.
    ///
    /// Returns `None` without spawning when there is nothing to post or no
    /// channel to post to. The caller never has to await the handle.
    pub fn dispatch(&self, citations: Vec<String>) -> Option<JoinHandle<()>> {
        if citations.is_empty() {
            return None;
        }
        let poster = self.poster.clone()?;
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            let count = citations.len();
            let success = match poster.post_citations(&citations).await {
                Ok(true) => {
                    info!(count, "Posted citations");
                    true
                }
                Ok(false) => {
                    warn!(count, "Citation channel declined the message");
                    false
                }
                Err(e) => {
                    warn!(count, error = %e, "Failed to post citations");
                    false
                }
            };
            if let Some(events) = events {
                let _ = events.send(SessionEvent::CitationsPosted { count, success });
            }
        }))
    }
}
