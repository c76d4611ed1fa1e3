//! Incoming-webhook channel (Slack, Discord, Mattermost and compatible chats).

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use parley_core::config::CitationsConfig;

use crate::{ChatChannel, SendResult};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    payload_key: String,
    max_message_length: usize,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, payload_key: impl Into<String>, max_message_length: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            payload_key: payload_key.into(),
            max_message_length,
        }
    }

    /// Build from config, or `None` when posting is disabled or no URL resolves.
    pub fn from_config(config: &CitationsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let url = config.resolve_webhook_url()?;
        Some(Self::new(url, config.payload_key.clone(), config.max_message_length))
    }

    pub fn payload(&self, text: &str) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(self.payload_key.clone(), serde_json::Value::String(text.to_string()));
        serde_json::Value::Object(body)
    }
}

#[async_trait]
impl ChatChannel for WebhookChannel {
    fn id(&self) -> &str {
        "webhook"
    }

    fn max_message_length(&self) -> Option<usize> {
        Some(self.max_message_length)
    }

    async fn send(&self, text: &str) -> anyhow::Result<SendResult> {
        if text.is_empty() {
            return Ok(SendResult::ok());
        }

        let resp = self
            .client
            .post(&self.url)
            .timeout(SEND_TIMEOUT)
            .json(&self.payload(text))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(SendResult::ok())
        } else {
            warn!(%status, "Webhook send failed");
            Ok(SendResult::failed(format!("webhook returned {status}")))
        }
    }
}
