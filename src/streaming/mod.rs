//! Streaming avatar provider integration.
//!
//! `token` issues the short-lived credential, `client` drives the
//! provider's session API, and `resilient` wraps both so a degraded
//! provider yields mock results instead of hard failures.

mod client;
mod error;
mod resilient;
mod token;

pub use client::{StreamingApi, StreamingClient};
pub use error::{StreamingError, StreamingResult};
pub use resilient::ResilientStreaming;
pub use token::{CredentialIssuer, TokenClient};

use std::fmt;

use uuid::Uuid;

// ============================================================================
// Credential
// ============================================================================

/// Short-lived bearer credential for the streaming provider.
///
/// Held only for one orchestration call chain, never persisted and never
/// cached across sessions. The token value is redacted from `Debug`; do
/// not log it through any other path.
#[derive(Clone)]
pub struct StreamingCredential {
    token: String,
    pub is_mock: bool,
}

impl StreamingCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            is_mock: false,
        }
    }

    /// Locally synthesized credential for degraded mode.
    pub fn mock() -> Self {
        Self {
            token: format!("mock-token-{}", Uuid::new_v4().simple()),
            is_mock: true,
        }
    }

    /// The bearer token value. Callers must not log it.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for StreamingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingCredential")
            .field("token", &"<redacted>")
            .field("is_mock", &self.is_mock)
            .finish()
    }
}

// ============================================================================
// Session
// ============================================================================

/// A live (or locally synthesized) avatar streaming session.
#[derive(Clone)]
pub struct StreamingSession {
    /// Provider-assigned id, or a local `mock-session-*` id.
    pub session_id: String,
    /// Real-time delivery address for the rendered stream.
    pub stream_endpoint: String,
    /// Session-scoped token the provider returns on create. Handed to the
    /// caller for joining the stream; never persisted.
    pub access_token: Option<String>,
    pub is_mock: bool,
}

impl StreamingSession {
    /// Structurally valid substitute for a session the provider could not
    /// supply.
    pub fn mock() -> Self {
        let session_id = format!("mock-session-{}", Uuid::new_v4().simple());
        let stream_endpoint = format!("wss://mock.stream.invalid/{}", session_id);
        Self {
            session_id,
            stream_endpoint,
            access_token: None,
            is_mock: true,
        }
    }
}

impl fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSession")
            .field("session_id", &self.session_id)
            .field("stream_endpoint", &self.stream_endpoint)
            .field("access_token", &self.access_token.as_deref().map(|_| "<redacted>"))
            .field("is_mock", &self.is_mock)
            .finish()
    }
}

/// Acknowledgement that a speak task was accepted (or synthesized).
#[derive(Debug, Clone)]
pub struct SpeakReceipt {
    pub task_id: String,
    pub is_mock: bool,
}

impl SpeakReceipt {
    pub fn mock() -> Self {
        Self {
            task_id: format!("mock-task-{}", Uuid::new_v4().simple()),
            is_mock: true,
        }
    }
}

/// Reject speak text before it reaches the network.
pub(crate) fn validate_speak_text(text: &str) -> StreamingResult<()> {
    if text.trim().is_empty() {
        return Err(StreamingError::EmptySpeakText);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
