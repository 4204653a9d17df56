use thiserror::Error;

use crate::conversation::ConversationError;
use crate::store::StoreError;
use crate::streaming::StreamingError;

/// Errors surfaced by session orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No session record with this id.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The session is in a terminal status and takes no more turns.
    #[error("session already ended: {0}")]
    SessionEnded(String),

    /// Unmasked streaming provider failure.
    #[error("streaming provider error: {0}")]
    Streaming(#[from] StreamingError),

    /// Conversational agent failure; the turn was not applied.
    #[error("conversation service error: {0}")]
    Conversation(#[from] ConversationError),

    /// Record store failure.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

impl OrchestratorError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unknown-session error.
    pub fn unknown_session(id: impl Into<String>) -> Self {
        Self::UnknownSession(id.into())
    }

    /// Create an already-ended error.
    pub fn session_ended(id: impl Into<String>) -> Self {
        Self::SessionEnded(id.into())
    }
}
