//! Interruptible speech playback.
//!
//! [`PlaybackController::start`] hands back a [`PlaybackHandle`] right away
//! and drives synthesis plus playback on a background task. The task wakes on
//! the handle's cancellation token and also polls the audio sink at the
//! configured interval, so `cancel()` from any task silences output within one
//! poll interval.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_core::error::ParleyError;
use parley_core::ports::SpeechSynthesizer;
use parley_core::types::OutputDevice;

/// Reference to one in-progress rendering. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackHandle {
    cancel: CancellationToken,
    done: CancellationToken,
}

impl PlaybackHandle {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// A handle for a turn that produced no audio.
    fn completed() -> Self {
        let handle = Self::new();
        handle.done.cancel();
        handle
    }

    /// Whether audio may still be rendering or playing.
    pub fn is_active(&self) -> bool {
        !self.done.is_cancelled()
    }

    /// Request playback to stop. Safe to call from any task, any number of
    /// times; a no-op once playback has finished.
    pub fn cancel(&self) {
        if self.is_active() {
            self.cancel.cancel();
        }
    }

    /// Whether `cancel()` was called before playback finished on its own.
    pub fn was_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once playback has ended, naturally or by cancellation.
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("active", &self.is_active())
            .field("cancelled", &self.was_cancelled())
            .finish()
    }
}

/// Marks the handle complete however the playback task exits.
struct DoneGuard(CancellationToken);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Starts cancellable playback of answers on one output device.
#[derive(Clone)]
pub struct PlaybackController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    device: OutputDevice,
    poll_interval: Duration,
}

impl PlaybackController {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        device: OutputDevice,
        poll_interval: Duration,
    ) -> Self {
        Self {
            synthesizer,
            device,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Speak `text`. Must be called from within a Tokio runtime.
    ///
    /// An unavailable output device is not an error: the returned handle is
    /// already complete and a warning is logged.
    pub fn start(&self, text: &str) -> PlaybackHandle {
        let text = speakable_text(text);
        if text.is_empty() {
            debug!("Nothing speakable in answer, skipping playback");
            return PlaybackHandle::completed();
        }

        if !self.synthesizer.is_device_available(&self.device) {
            warn!(device = %self.device.name, "Output device unavailable, answer will not be heard");
            return PlaybackHandle::completed();
        }

        let handle = PlaybackHandle::new();
        let synthesizer = self.synthesizer.clone();
        let device = self.device.clone();
        let poll_interval = self.poll_interval;
        let cancel = handle.cancel.clone();
        let done = DoneGuard(handle.done.clone());

        tokio::spawn(async move {
            let _done = done;
            play(synthesizer, device, text, poll_interval, cancel).await;
        });

        handle
    }
}

async fn play(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    device: OutputDevice,
    text: String,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let rendered = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Playback cancelled during synthesis");
            return;
        }
        r = synthesizer.synthesize(&text, &device) => r,
    };

    let mut sink = match rendered {
        Ok(sink) => sink,
        Err(ParleyError::DeviceUnavailable(reason)) => {
            warn!(device = %device.name, %reason, "Output device unavailable, skipping playback");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Speech synthesis failed, skipping playback");
            return;
        }
    };

    debug!(device = %device.name, chars = text.len(), "Playback started");
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sink.stop();
                debug!("Playback stopped by interruption");
                return;
            }
            _ = ticker.tick() => {
                if !sink.is_playing() {
                    debug!("Playback finished");
                    return;
                }
            }
        }
    }
}

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid regex"));
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static LINE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:#{1,6}\s+|>\s*|[-*+]\s+|\d+\.\s+)").expect("valid regex"));

/// Paired emphasis, outermost markers first. The inner text may not start or
/// end with whitespace, so `2 * 3 * 4` is left alone.
static EMPHASIS: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        r"\*\*([^*\s](?:[^*\n]*[^*\s])?)\*\*",
        r"__([^_\s](?:[^_\n]*[^_\s])?)__",
        r"~~([^~\s](?:[^~\n]*[^~\s])?)~~",
        r"\*([^*\s](?:[^*\n]*[^*\s])?)\*",
        // `_` is a word character, so `\b` keeps `snake_case_name` intact.
        r"\b_([^_\s](?:[^_\n]*[^_\s])?)_\b",
        r"`+([^`\n]*)`+",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
});
/// Marker runs left standing on their own, e.g. an unclosed `**`.
static STRAY_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)[*_~`]{2,}(?:\s|$)").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reduce generator output to what should be read aloud.
///
/// Link labels are kept, link targets and bare URLs are dropped (they go to
/// chat), and markdown/HTML formatting is removed. Entities are decoded
/// first so an escaped tag is stripped like a literal one.
pub fn speakable_text(text: &str) -> String {
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "and");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    let text = BARE_URL.replace_all(&text, "");
    let mut text = LINE_MARKER.replace_all(&text, "").into_owned();
    for pattern in EMPHASIS.iter() {
        text = pattern.replace_all(&text, "$1").into_owned();
    }
    let text = STRAY_MARKERS.replace_all(&text, " ").replace('|', " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
