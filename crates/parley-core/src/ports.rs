//! Narrow interfaces to the collaborators the turn-taking core drives but
//! does not implement: speech recognition, speech synthesis, answer
//! generation, and the citation side channel.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{OutputDevice, Recognition, SpeechRequest};

/// Speech-to-text over a live audio source owned by the implementation.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Capture one phrase and transcribe it.
    ///
    /// Waits at most `timeout` for speech to begin and records at most
    /// `max_phrase` of it. Not hearing anything is `Ok(Recognition::Timeout)`,
    /// not an error. `Err(ParleyError::AudioSourceLost)` means the source is
    /// gone for good; any other error is an engine fault the caller may retry.
    async fn recognize(&self, timeout: Duration, max_phrase: Duration) -> Result<Recognition>;
}

/// Audio that is currently being played out.
pub trait AudioSink: Send + 'static {
    /// Whether audio is still coming out of the device.
    fn is_playing(&self) -> bool;

    /// Stop output immediately. Must be idempotent.
    fn stop(&mut self);
}

/// Text-to-speech rendering plus playback on an output device.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Whether `device` can currently accept audio.
    fn is_device_available(&self, device: &OutputDevice) -> bool;

    /// Render `text` and start playing it on `device`.
    async fn synthesize(&self, text: &str, device: &OutputDevice) -> Result<Box<dyn AudioSink>>;
}

/// Maps a question to an answer and the links that support it.
#[async_trait]
pub trait ResponseGenerator: Send + Sync + 'static {
    async fn generate_answer(&self, question: &str) -> Result<SpeechRequest>;
}

/// Posts citation URLs to a side channel such as the meeting chat.
#[async_trait]
pub trait CitationPoster: Send + Sync + 'static {
    /// Returns `Ok(false)` when the channel declined the message.
    async fn post_citations(&self, citations: &[String]) -> Result<bool>;
}
