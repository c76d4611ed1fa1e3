use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("Config error: {0}")]
    Config(String),

    /// The capture source is gone; the listener cannot continue.
    #[error("Audio source lost: {0}")]
    AudioSourceLost(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The answer service could not be reached at all.
    #[error("Generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Citation dispatch error: {0}")]
    CitationDispatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParleyError {
    /// Whether the listener must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AudioSourceLost(_))
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
