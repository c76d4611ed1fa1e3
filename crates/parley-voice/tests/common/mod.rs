//! Scripted ports and a session harness for turn-taking tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use parley_core::config::VoiceConfig;
use parley_core::error::{ParleyError, Result};
use parley_core::ports::{
    AudioSink, CitationPoster, ResponseGenerator, SpeechRecognizer, SpeechSynthesizer,
};
use parley_core::types::{ConversationState, OutputDevice, Recognition, SpeechRequest};
use parley_voice::{SessionEvent, VoicePorts, VoiceSession, VoiceSessionHandle};

pub const POLL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(3);

// --- microphone ---

/// Recognizer fed by the test. Dropping the [`Mic`] unplugs it.
pub struct ScriptedRecognizer {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Recognition>>,
}

pub struct Mic(mpsc::UnboundedSender<Recognition>);

impl Mic {
    pub fn say(&self, text: &str) {
        let _ = self.0.send(Recognition::Recognized(text.to_string()));
    }

    pub fn silence(&self) {
        let _ = self.0.send(Recognition::Timeout);
    }

    pub fn mumble(&self) {
        let _ = self.0.send(Recognition::Unintelligible);
    }
}

pub fn microphone() -> (Mic, Arc<ScriptedRecognizer>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Mic(tx),
        Arc::new(ScriptedRecognizer {
            rx: tokio::sync::Mutex::new(rx),
        }),
    )
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _timeout: Duration, _max_phrase: Duration) -> Result<Recognition> {
        match self.rx.lock().await.recv().await {
            Some(recognition) => Ok(recognition),
            None => Err(ParleyError::AudioSourceLost("microphone unplugged".into())),
        }
    }
}

// --- speaker ---

/// Renders each answer as a stream of 1ms "chunks" lasting `duration`.
pub struct FakeSynth {
    available: bool,
    duration: Duration,
    pub spoken: Mutex<Vec<String>>,
    pub chunks: Arc<AtomicUsize>,
    playing_now: Arc<AtomicUsize>,
    pub max_concurrent: Arc<AtomicUsize>,
}

impl FakeSynth {
    pub fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self::with_device(true, duration))
    }

    pub fn without_device() -> Arc<Self> {
        Arc::new(Self::with_device(false, Duration::from_secs(10)))
    }

    fn with_device(available: bool, duration: Duration) -> Self {
        Self {
            available,
            duration,
            spoken: Mutex::new(Vec::new()),
            chunks: Arc::new(AtomicUsize::new(0)),
            playing_now: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn chunks(&self) -> usize {
        self.chunks.load(Ordering::SeqCst)
    }
}

struct FakeSink(Arc<AtomicBool>);

impl AudioSink for FakeSink {
    fn is_playing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn is_device_available(&self, _device: &OutputDevice) -> bool {
        self.available
    }

    async fn synthesize(&self, text: &str, _device: &OutputDevice) -> Result<Box<dyn AudioSink>> {
        self.spoken.lock().unwrap().push(text.to_string());

        let now = self.playing_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        let playing = Arc::new(AtomicBool::new(true));
        let flag = playing.clone();
        let chunks = self.chunks.clone();
        let playing_now = self.playing_now.clone();
        let duration = self.duration;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            while flag.load(Ordering::SeqCst) && start.elapsed() < duration {
                chunks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            flag.store(false, Ordering::SeqCst);
            playing_now.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(Box::new(FakeSink(playing)))
    }
}

// --- generator ---

pub struct FakeGenerator {
    delay: Duration,
    fail: bool,
    citations: Vec<String>,
    pub asked: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(Duration::ZERO, false, Vec::new()))
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(delay, false, Vec::new()))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(Duration::ZERO, true, Vec::new()))
    }

    pub fn citing(citations: &[&str]) -> Arc<Self> {
        let citations = citations.iter().map(|c| c.to_string()).collect();
        Arc::new(Self::build(Duration::ZERO, false, citations))
    }

    fn build(delay: Duration, fail: bool, citations: Vec<String>) -> Self {
        Self {
            delay,
            fail,
            citations,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseGenerator for FakeGenerator {
    async fn generate_answer(&self, question: &str) -> Result<SpeechRequest> {
        self.asked.lock().unwrap().push(question.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ParleyError::Generator("upstream returned 503".into()));
        }
        Ok(SpeechRequest::new(
            format!("Answer to {question}."),
            self.citations.clone(),
        ))
    }
}

// --- citation channel ---

#[derive(Default)]
pub struct RecordingPoster {
    pub posted: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl CitationPoster for RecordingPoster {
    async fn post_citations(&self, citations: &[String]) -> Result<bool> {
        self.posted.lock().unwrap().push(citations.to_vec());
        Ok(true)
    }
}

// --- harness ---

pub struct Harness {
    pub mic: Mic,
    pub handle: VoiceSessionHandle,
    pub events: broadcast::Receiver<SessionEvent>,
    pub state: watch::Receiver<ConversationState>,
}

pub fn voice_config() -> VoiceConfig {
    VoiceConfig {
        silence_ticks: 1,
        poll_interval_ms: POLL.as_millis() as u64,
        error_backoff_ms: 1,
        ..VoiceConfig::default()
    }
}

pub fn start(
    synth: Arc<FakeSynth>,
    generator: Arc<FakeGenerator>,
    poster: Option<Arc<RecordingPoster>>,
) -> Harness {
    start_with(voice_config(), synth, generator, poster)
}

pub fn start_with(
    config: VoiceConfig,
    synth: Arc<FakeSynth>,
    generator: Arc<FakeGenerator>,
    poster: Option<Arc<RecordingPoster>>,
) -> Harness {
    let (mic, recognizer) = microphone();
    let ports = VoicePorts {
        recognizer,
        synthesizer: synth,
        generator,
        citations: poster.map(|p| p as Arc<dyn CitationPoster>),
    };
    let session = VoiceSession::new(&config, ports);
    let events = session.subscribe();
    let handle = session.start();
    let state = handle.watch_state();
    Harness {
        mic,
        handle,
        events,
        state,
    }
}

impl Harness {
    pub async fn wait_for_state(&mut self, expected: ConversationState) {
        tokio::time::timeout(WAIT, self.state.wait_for(|s| *s == expected))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {expected}"))
            .expect("coordinator dropped its state");
    }

    /// Skip events until one matches.
    pub async fn wait_for_event<F>(&mut self, mut matches: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let next = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for session event");
            match next {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    }

    /// Ask a question and let one silent capture pass so it is dispatched.
    pub fn ask(&self, question: &str) {
        self.mic.say(&format!("okay assistant {question}"));
        self.mic.silence();
    }
}
