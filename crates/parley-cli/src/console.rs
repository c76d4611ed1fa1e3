//! Terminal stand-ins for the microphone and the speaker.
//!
//! Each stdin line is one recognized phrase: a blank line is unintelligible
//! speech, no line within the capture timeout is silence, and end of input
//! means the microphone is gone. Answers are printed word by word so that
//! typing a line while the bot "speaks" interrupts it.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use parley_core::error::{ParleyError, Result};
use parley_core::ports::{AudioSink, SpeechRecognizer, SpeechSynthesizer};
use parley_core::types::{OutputDevice, Recognition};

/// Device name that simulates a missing speaker.
pub const NO_DEVICE: &str = "none";

pub struct StdinRecognizer {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl StdinRecognizer {
    /// Start reading stdin on a background thread.
    pub fn spawn() -> Arc<Self> {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Read lines from `reader` on a detached OS thread. A blocking read
    /// cannot be cancelled, so the thread is never joined and a pending
    /// read does not hold up runtime shutdown after Ctrl-C.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        return;
                    }
                }
            }
            debug!("stdin closed");
        });
        Arc::new(Self {
            lines: Mutex::new(rx),
        })
    }
}

pub fn classify_line(line: &str) -> Recognition {
    if line.trim().is_empty() {
        Recognition::Unintelligible
    } else {
        Recognition::Recognized(line.trim().to_string())
    }
}

#[async_trait]
impl SpeechRecognizer for StdinRecognizer {
    async fn recognize(&self, timeout: Duration, _max_phrase: Duration) -> Result<Recognition> {
        let mut lines = self.lines.lock().await;
        match tokio::time::timeout(timeout, lines.recv()).await {
            Err(_) => Ok(Recognition::Timeout),
            Ok(Some(line)) => Ok(classify_line(&line)),
            Ok(None) => Err(ParleyError::AudioSourceLost("stdin closed".into())),
        }
    }
}

/// "Speaks" by printing one word at a time.
pub struct ConsoleSynthesizer {
    word_delay: Duration,
}

impl ConsoleSynthesizer {
    pub fn new(word_delay: Duration) -> Self {
        Self { word_delay }
    }
}

struct ConsoleSink {
    playing: Arc<AtomicBool>,
}

impl AudioSink for ConsoleSink {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            println!(" [interrupted]");
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn is_device_available(&self, device: &OutputDevice) -> bool {
        device.name != NO_DEVICE
    }

    async fn synthesize(&self, text: &str, _device: &OutputDevice) -> Result<Box<dyn AudioSink>> {
        let playing = Arc::new(AtomicBool::new(true));
        let flag = playing.clone();
        let words: Vec<String> = text.split_whitespace().map(String::from).collect();
        let word_delay = self.word_delay;

        tokio::spawn(async move {
            print!("[bot]");
            for word in words {
                if !flag.load(Ordering::SeqCst) {
                    return;
                }
                print!(" {word}");
                let _ = std::io::stdout().flush();
                tokio::time::sleep(word_delay).await;
            }
            if flag.swap(false, Ordering::SeqCst) {
                println!();
            }
        });

        Ok(Box::new(ConsoleSink { playing }))
    }
}
