use thiserror::Error;

pub type StreamingResult<T> = Result<T, StreamingError>;

/// Errors from the streaming provider integration.
#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("speak text must not be empty")]
    EmptySpeakText,
}

impl StreamingError {
    /// Business-rule failures surface as-is; everything else is a provider
    /// failure the resilient layer may mask.
    pub fn is_validation(&self) -> bool {
        matches!(self, StreamingError::EmptySpeakText)
    }
}
