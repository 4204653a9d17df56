//! Provider session client: create, start, speak, stop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::VoiceSettings;

use super::{
    SpeakReceipt, StreamingCredential, StreamingError, StreamingResult, StreamingSession,
    validate_speak_text,
};

const SESSION_QUALITY: &str = "high";
const PROTOCOL_VERSION: &str = "v2";
const TASK_TYPE_REPEAT: &str = "repeat";

/// Streaming session operations against the avatar provider.
///
/// Honest client: no retries, no masking, bounded timeout per call. A
/// provider-reported "already started"/"already stopped" condition counts
/// as success, since the remote state already matches the caller's intent.
#[async_trait]
pub trait StreamingApi: Send + Sync {
    async fn create_session(
        &self,
        credential: &StreamingCredential,
        avatar_name: &str,
        voice: &VoiceSettings,
    ) -> StreamingResult<StreamingSession>;

    async fn start_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()>;

    /// Submit `text` as a speak task. Empty or whitespace-only text is
    /// rejected before any request is made.
    async fn speak(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
        text: &str,
    ) -> StreamingResult<SpeakReceipt>;

    async fn stop_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()>;
}

pub struct StreamingClient {
    client: reqwest::Client,
    base_url: String,
    session_timeout: Duration,
    speak_timeout: Duration,
}

impl StreamingClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        session_timeout: Duration,
        speak_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            session_timeout,
            speak_timeout,
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        credential: &StreamingCredential,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> StreamingResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.token())
            .json(body)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }

    async fn api_error(response: reqwest::Response) -> StreamingError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        StreamingError::Api { status, message }
    }
}

#[async_trait]
impl StreamingApi for StreamingClient {
    async fn create_session(
        &self,
        credential: &StreamingCredential,
        avatar_name: &str,
        voice: &VoiceSettings,
    ) -> StreamingResult<StreamingSession> {
        let request = NewSessionRequest {
            avatar_name,
            voice,
            quality: SESSION_QUALITY,
            version: PROTOCOL_VERSION,
        };
        let response = self
            .post(credential, "/v1/streaming.new", &request, self.session_timeout)
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: Envelope<NewSessionData> = response.json().await?;
        let data = body.data.ok_or_else(|| {
            StreamingError::MalformedResponse("streaming.new response carried no data".to_string())
        })?;
        if data.session_id.is_empty() || data.url.is_empty() {
            return Err(StreamingError::MalformedResponse(
                "streaming.new response missing session id or delivery url".to_string(),
            ));
        }

        Ok(StreamingSession {
            session_id: data.session_id,
            stream_endpoint: data.url,
            access_token: data.access_token,
            is_mock: false,
        })
    }

    async fn start_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()> {
        let request = SessionIdRequest {
            session_id: &session.session_id,
        };
        let response = self
            .post(credential, "/v1/streaming.start", &request, self.session_timeout)
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        if indicates_already_satisfied(&message, &["already started", "already active"]) {
            return Ok(());
        }
        Err(StreamingError::Api { status, message })
    }

    async fn speak(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
        text: &str,
    ) -> StreamingResult<SpeakReceipt> {
        validate_speak_text(text)?;

        let request = SpeakTaskRequest {
            session_id: &session.session_id,
            text,
            task_type: TASK_TYPE_REPEAT,
        };
        let response = self
            .post(credential, "/v1/streaming.task", &request, self.speak_timeout)
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: Envelope<SpeakTaskData> = response.json().await?;
        let task_id = body
            .data
            .and_then(|data| data.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                StreamingError::MalformedResponse(
                    "streaming.task response carried no task id".to_string(),
                )
            })?;

        Ok(SpeakReceipt {
            task_id,
            is_mock: false,
        })
    }

    async fn stop_session(
        &self,
        credential: &StreamingCredential,
        session: &StreamingSession,
    ) -> StreamingResult<()> {
        let request = SessionIdRequest {
            session_id: &session.session_id,
        };
        let response = self
            .post(credential, "/v1/streaming.stop", &request, self.speak_timeout)
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        if indicates_already_satisfied(&message, &["already stopped", "already ended"]) {
            return Ok(());
        }
        Err(StreamingError::Api { status, message })
    }
}

/// Does the provider's error message say the requested state already holds?
fn indicates_already_satisfied(message: &str, needles: &[&str]) -> bool {
    let lower = message.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct NewSessionRequest<'a> {
    avatar_name: &'a str,
    voice: &'a VoiceSettings,
    quality: &'a str,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct SessionIdRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SpeakTaskRequest<'a> {
    session_id: &'a str,
    text: &'a str,
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct NewSessionData {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpeakTaskData {
    #[serde(default)]
    task_id: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
