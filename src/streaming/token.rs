//! Short-lived credential issue.
//!
//! The one provider call authenticated with the configured API key rather
//! than an issued credential.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{StreamingCredential, StreamingError, StreamingResult};

/// Issues short-lived streaming credentials.
///
/// Honest client: provider failures surface as typed errors, and the
/// resilient layer decides whether to mask them.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self) -> StreamingResult<StreamingCredential>;
}

pub struct TokenClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl TokenClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CredentialIssuer for TokenClient {
    async fn issue(&self) -> StreamingResult<StreamingCredential> {
        let url = format!("{}/v1/streaming.create_token", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StreamingError::Api { status, message });
        }

        let body: CreateTokenResponse = response.json().await?;
        let token = body
            .data
            .and_then(|data| data.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                StreamingError::MalformedResponse(
                    "create_token response carried no token".to_string(),
                )
            })?;

        Ok(StreamingCredential::new(token))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateTokenResponse {
    #[serde(default)]
    data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(default)]
    token: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
