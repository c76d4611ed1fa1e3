//! Chat channels that carry citation links next to the spoken conversation.
//!
//! Every destination implements [`ChatChannel`]. [`ChannelCitationPoster`]
//! adapts any channel to the voice session's citation port: it formats the
//! link list, strips characters chat inputs commonly reject, and splits the
//! message to the channel's length limit.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use parley_core::error::{ParleyError, Result};
use parley_core::ports::CitationPoster;

pub mod console;
pub mod webhook;

/// Outcome of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The core channel trait.
#[async_trait]
pub trait ChatChannel: Send + Sync + 'static {
    /// Channel identifier used in logs (e.g. "webhook", "console").
    fn id(&self) -> &str;

    /// Longest message the channel accepts, in characters.
    fn max_message_length(&self) -> Option<usize> {
        None
    }

    /// Post one message.
    async fn send(&self, text: &str) -> anyhow::Result<SendResult>;
}

/// Render citation links as a chat message, or `None` when there are none.
pub fn format_citations(citations: &[String]) -> Option<String> {
    let links: Vec<String> = citations
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| format!("- {c}"))
        .collect();
    if links.is_empty() {
        return None;
    }
    Some(format!("Sources:\n{}", links.join("\n")))
}

/// Drop characters outside the Basic Multilingual Plane (emoji and the like).
pub fn sanitize_message(text: &str) -> String {
    text.chars().filter(|c| (*c as u32) < 0x10000).collect()
}

/// Split a message into chunks of at most `max_len` characters, preferring
/// line boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some((limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };
        let split_at = if remaining[limit..].starts_with('\n') {
            limit
        } else {
            match remaining[..limit].rfind('\n') {
                Some(0) | None => limit,
                Some(at) => at,
            }
        };
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
    }
    chunks
}

/// Posts citations through a [`ChatChannel`].
pub struct ChannelCitationPoster {
    channel: Arc<dyn ChatChannel>,
}

impl ChannelCitationPoster {
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl CitationPoster for ChannelCitationPoster {
    async fn post_citations(&self, citations: &[String]) -> Result<bool> {
        let Some(message) = format_citations(citations) else {
            return Ok(true);
        };
        let message = sanitize_message(&message);
        let chunks = match self.channel.max_message_length() {
            Some(max) => split_message(&message, max),
            None => vec![message],
        };

        for chunk in &chunks {
            let result = self
                .channel
                .send(chunk)
                .await
                .map_err(|e| ParleyError::CitationDispatch(format!("{}: {e}", self.channel.id())))?;
            if !result.success {
                warn!(
                    channel = self.channel.id(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Channel rejected citation message"
                );
                return Ok(false);
            }
        }

        debug!(channel = self.channel.id(), chunks = chunks.len(), "Citation message sent");
        Ok(true)
    }
}
