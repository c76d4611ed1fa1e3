//! HTTP answer service client.
//!
//! `POST {url}` with `{"question": "..."}`; the service replies with
//! `{"answer": "...", "citations": ["https://...", ...]}`. `citations` may be
//! omitted.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::config::GeneratorConfig;
use parley_core::error::{ParleyError, Result};
use parley_core::ports::ResponseGenerator;
use parley_core::types::SpeechRequest;

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

pub struct HttpResponseGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpResponseGenerator {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(ParleyError::Config("generator.url cannot be empty".into()));
        }
        Ok(Self::new(config.url.clone(), config.resolve_api_key(), config.timeout()))
    }
}

/// Parse a service reply. Blank citation entries are dropped.
fn parse_answer(body: &str) -> Result<SpeechRequest> {
    let response: AnswerResponse = serde_json::from_str(body)?;
    let citations = response
        .citations
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    Ok(SpeechRequest::new(response.answer, citations))
}

#[async_trait]
impl ResponseGenerator for HttpResponseGenerator {
    async fn generate_answer(&self, question: &str) -> Result<SpeechRequest> {
        let mut req = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("content-type", "application/json");
        if let Some(api_key) = &self.api_key {
            req = req.header("authorization", format!("Bearer {api_key}"));
        }

        let response = req
            .json(&AnswerRequest { question })
            .send()
            .await
            .map_err(|e| ParleyError::GeneratorUnavailable(format!("answer service unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ParleyError::Generator(format!("failed to read answer: {e}")))?;
        if !status.is_success() {
            return Err(ParleyError::Generator(format!("answer service error {status}: {body}")));
        }

        let request = parse_answer(&body)
            .map_err(|e| ParleyError::Generator(format!("malformed answer: {e}")))?;
        debug!(citations = request.citations.len(), "Answer received");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        let request = parse_answer(r#"{"answer": "Rust is a language.", "citations": ["https://a", " "]}"#).unwrap();
        assert_eq!(request.answer, "Rust is a language.");
        assert_eq!(request.citations, vec!["https://a"]);
    }

    #[test]
    fn test_parse_answer_without_citations() {
        let request = parse_answer(r#"{"answer": "Yes."}"#).unwrap();
        assert!(request.citations.is_empty());
    }

    #[test]
    fn test_parse_answer_rejects_missing_answer() {
        assert!(parse_answer(r#"{"citations": []}"#).is_err());
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = GeneratorConfig {
            url: " ".into(),
            api_key: None,
            api_key_env: None,
            timeout_ms: 1000,
        };
        assert!(matches!(
            HttpResponseGenerator::from_config(&config),
            Err(ParleyError::Config(_))
        ));
    }
}
