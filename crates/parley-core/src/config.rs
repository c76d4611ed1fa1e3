//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::OutputDevice;

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<CitationsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Turn-taking behaviour of the voice session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Wake phrase variants, checked in order; the first prefix match wins.
    #[serde(default = "default_wake_phrases")]
    pub wake_phrases: Vec<String>,

    /// Consecutive silent captures required before a question is answered.
    #[serde(default = "default_silence_ticks")]
    pub silence_ticks: u32,

    /// How long one capture waits for speech to begin (default: 2000).
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// Longest phrase recorded in one capture (default: 15000).
    #[serde(default = "default_max_phrase_ms")]
    pub max_phrase_ms: u64,

    /// Playback cancellation poll interval (default: 100).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Output device the answers are played on.
    #[serde(default = "default_output_device")]
    pub output_device: String,

    /// Sentence appended to spoken answers whose links were posted to chat.
    #[serde(default = "default_citation_notice")]
    pub citation_notice: Option<String>,

    /// Spoken when the generator fails.
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,

    /// Spoken when the answer service cannot be reached.
    #[serde(default = "default_unavailable_answer")]
    pub unavailable_answer: String,

    /// Pause after a recognition engine fault (default: 1000).
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            wake_phrases: default_wake_phrases(),
            silence_ticks: default_silence_ticks(),
            capture_timeout_ms: default_capture_timeout_ms(),
            max_phrase_ms: default_max_phrase_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            output_device: default_output_device(),
            citation_notice: default_citation_notice(),
            fallback_answer: default_fallback_answer(),
            unavailable_answer: default_unavailable_answer(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

fn default_wake_phrases() -> Vec<String> {
    ["okay assistant", "ok assistant", "okay system", "ok system"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_silence_ticks() -> u32 {
    1
}

fn default_capture_timeout_ms() -> u64 {
    2_000
}

fn default_max_phrase_ms() -> u64 {
    15_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_output_device() -> String {
    "default".into()
}

fn default_citation_notice() -> Option<String> {
    Some("I've added some reference links in the chat for you.".into())
}

fn default_fallback_answer() -> String {
    "I'm sorry, I couldn't process that. Could you rephrase your question?".into()
}

fn default_unavailable_answer() -> String {
    "I'm having trouble with my AI connection. Could you please repeat that?".into()
}

fn default_error_backoff_ms() -> u64 {
    1_000
}

impl VoiceConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn max_phrase(&self) -> Duration {
        Duration::from_millis(self.max_phrase_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn output_device(&self) -> OutputDevice {
        OutputDevice::new(self.output_device.clone())
    }
}

/// External answer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Endpoint that accepts `{"question": ...}` and returns `{"answer", "citations"}`.
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Request timeout in ms (default: 30000).
    #[serde(default = "default_generator_timeout")]
    pub timeout_ms: u64,
}

fn default_generator_timeout() -> u64 {
    30_000
}

impl GeneratorConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Side channel the citation links are posted to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Incoming-webhook URL of the chat (Slack, Discord, Mattermost, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url_env: Option<String>,

    /// JSON key carrying the message text (default: "text"; Discord uses "content").
    #[serde(default = "default_payload_key")]
    pub payload_key: String,

    /// Split longer messages (default: 2000).
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for CitationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            webhook_url_env: None,
            payload_key: default_payload_key(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_payload_key() -> String {
    "text".into()
}

fn default_max_message_length() -> usize {
    2_000
}

impl CitationsConfig {
    pub fn resolve_webhook_url(&self) -> Option<String> {
        resolve_secret_field(&self.webhook_url, &self.webhook_url_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "parley_voice=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::ParleyError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(path = %path.display(), "Loading config");
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config text (JSON5), substituting `${ENV_VAR}` references.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let substituted = substitute_env_vars(raw)?;

        json5::from_str(&substituted).map_err(|e| crate::error::ParleyError::Config(e.to_string()))
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Voice settings, with defaults filled in when the section is absent.
    pub fn voice(&self) -> VoiceConfig {
        self.voice.clone().unwrap_or_default()
    }

    /// Citation settings, with defaults filled in when the section is absent.
    pub fn citations(&self) -> CitationsConfig {
        self.citations.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "voice.silence_ticks").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let voice = self.voice();
        if voice.wake_phrases.iter().all(|p| p.trim().is_empty()) {
            errors.push("voice.wake_phrases must contain at least one phrase".to_string());
        }
        if voice.silence_ticks == 0 {
            errors.push("voice.silence_ticks must be at least 1".to_string());
        }
        if voice.poll_interval_ms == 0 {
            errors.push("voice.poll_interval_ms cannot be 0".to_string());
        } else if voice.poll_interval_ms > 1_000 {
            warnings.push(format!(
                "voice.poll_interval_ms is {}ms; interruptions will feel sluggish",
                voice.poll_interval_ms
            ));
        }
        if voice.capture_timeout_ms == 0 {
            errors.push("voice.capture_timeout_ms cannot be 0".to_string());
        }
        if voice.capture_timeout_ms > voice.max_phrase_ms {
            warnings.push(format!(
                "voice.capture_timeout_ms ({}) exceeds voice.max_phrase_ms ({})",
                voice.capture_timeout_ms, voice.max_phrase_ms
            ));
        }

        if let Some(generator) = &self.generator {
            if generator.url.is_empty() {
                errors.push("generator.url cannot be empty".to_string());
            }
            if generator.resolve_api_key().is_none() {
                warnings.push("Generator has no API key configured".to_string());
            }
        }

        if let Some(citations) = &self.citations {
            if citations.enabled && citations.resolve_webhook_url().is_none() {
                warnings.push(
                    "citations.enabled is set but no webhook URL resolves; links go to the console"
                        .to_string(),
                );
            }
            if citations.max_message_length == 0 {
                errors.push("citations.max_message_length cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Parley data: `~/.parley/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}
