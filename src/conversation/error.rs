use thiserror::Error;

pub type ConversationResult<T> = Result<T, ConversationError>;

/// Errors from the conversational agent service.
///
/// Unlike streaming failures these are never masked: a synthesized reply
/// could mis-score the assessment, so the turn is dropped and the caller
/// retries.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("agent service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed agent response: {0}")]
    MalformedResponse(String),
}
