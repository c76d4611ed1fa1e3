use async_trait::async_trait;

use parley_core::error::Result;
use parley_core::ports::ResponseGenerator;
use parley_core::types::SpeechRequest;

/// Repeats the question back. Never cites anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate_answer(&self, question: &str) -> Result<SpeechRequest> {
        Ok(SpeechRequest::new(format!("You asked: {question}"), Vec::new()))
    }
}
