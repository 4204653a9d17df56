//! Fallback wrapper around the streaming provider.
//!
//! Provider outages must not break an assessment run, so every provider
//! call can degrade into a structurally valid mock result instead of an
//! error. Validation failures are the exception: they signal caller bugs
//! and are always surfaced.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::api::VoiceSettings;
use crate::streaming::client::StreamingApi;
use crate::streaming::token::CredentialIssuer;
use crate::streaming::{
    SpeakReceipt, StreamingCredential, StreamingResult, StreamingSession, validate_speak_text,
};

/// Streaming facade with failure masking.
///
/// Wraps a [`CredentialIssuer`] and a [`StreamingApi`] and, when
/// `mask_failures` is on, converts provider errors into mock results so
/// the rest of the session flow keeps working. Mock inputs short-circuit:
/// a mock credential never reaches the network, and a mock session is
/// started, spoken to, and stopped entirely locally.
pub struct ResilientStreaming {
    issuer: Arc<dyn CredentialIssuer>,
    api: Arc<dyn StreamingApi>,
    mask_failures: bool,
    mock_speak_delay: Duration,
}

impl ResilientStreaming {
    pub fn new(
        issuer: Arc<dyn CredentialIssuer>,
        api: Arc<dyn StreamingApi>,
        mask_failures: bool,
        mock_speak_delay: Duration,
    ) -> Self {
        Self {
            issuer,
            api,
            mask_failures,
            mock_speak_delay,
        }
    }

    /// Issue a streaming credential, degrading to a mock one on failure.
    pub async fn issue_credential(&self) -> StreamingResult<StreamingCredential> {
        match self.issuer.issue().await {
            Ok(credential) => Ok(credential),
            Err(err) if self.mask_failures && !err.is_validation() => {
                warn!(error = %err, "credential issuance failed, continuing with mock credential");
                Ok(StreamingCredential::mock())
            }
            Err(err) => Err(err),
        }
    }

    /// Create an avatar session.
    ///
    /// A mock credential cannot authenticate against the real provider, so
    /// it yields a mock session without any network call.
    pub async fn create_session(
        &self,
        credential: &StreamingCredential,
        avatar_name: &str,
        voice: &VoiceSettings,
    ) -> StreamingResult<StreamingSession> {
        if credential.is_mock {
            return Ok(StreamingSession::mock());
        }
        match self.api.create_session(credential, avatar_name, voice).await {
            Ok(session) => Ok(session),
            Err(err) if self.mask_failures && !err.is_validation() => {
                warn!(error = %err, "session creation failed, continuing with mock session");
                Ok(StreamingSession::mock())
            }
            Err(err) => Err(err),
        }
    }

    /// Start a created session. No-op for mock sessions.
    pub async fn start_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()> {
        if session.is_mock {
            return Ok(());
        }
        match self.api.start_session(credential, session).await {
            Ok(()) => Ok(()),
            Err(err) if self.mask_failures && !err.is_validation() => {
                warn!(
                    error = %err,
                    session_id = %session.session_id,
                    "session start failed, treating session as started",
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Have the avatar speak `text` verbatim.
    ///
    /// Empty text is rejected before anything else happens, masked or not.
    /// Mock sessions simulate speech with a short delay so callers observe
    /// realistic pacing.
    pub async fn speak(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
        text: &str,
    ) -> StreamingResult<SpeakReceipt> {
        validate_speak_text(text)?;
        if session.is_mock {
            tokio::time::sleep(self.mock_speak_delay).await;
            return Ok(SpeakReceipt::mock());
        }
        match self.api.speak(credential, session, text).await {
            Ok(receipt) => Ok(receipt),
            Err(err) if self.mask_failures && !err.is_validation() => {
                warn!(
                    error = %err,
                    session_id = %session.session_id,
                    "speak task failed, acknowledging with mock receipt",
                );
                Ok(SpeakReceipt::mock())
            }
            Err(err) => Err(err),
        }
    }

    /// Stop a session. No-op for mock sessions.
    pub async fn stop_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()> {
        if session.is_mock {
            return Ok(());
        }
        match self.api.stop_session(credential, session).await {
            Ok(()) => Ok(()),
            Err(err) if self.mask_failures && !err.is_validation() => {
                warn!(
                    error = %err,
                    session_id = %session.session_id,
                    "session stop failed, treating session as stopped",
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
