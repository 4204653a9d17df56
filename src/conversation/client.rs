//! HTTP client for the agent completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::{generate_chat_session_id, generate_message_id};

use super::{
    AgentExchange, ConversationError, ConversationResult, FALLBACK_ACKNOWLEDGEMENT, TurnContext,
};

/// Client-side view of the conversational agent service.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Run one turn. Errors are surfaced, never masked.
    async fn exchange(&self, turn: &TurnContext) -> ConversationResult<AgentExchange>;
}

pub struct AgentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl AgentClient {
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
impl AgentService for AgentClient {
    async fn exchange(&self, turn: &TurnContext) -> ConversationResult<AgentExchange> {
        let chat_session_id = turn
            .chat_session_id
            .clone()
            .unwrap_or_else(generate_chat_session_id);
        let message_id = generate_message_id();
        let request = CompletionsRequest {
            user_reply: &turn.utterance,
            course_id: &turn.course_id,
            user_id: &turn.user_id,
            user_name: &turn.user_name,
            chat_session_id: &chat_session_id,
            doctor_name: &turn.persona.display_name,
            doctor_avatar: &turn.persona.avatar_id,
            doctor_tone: &turn.persona.tone,
            doctor_mood: &turn.persona.mood,
            message_id: &message_id,
            welcome_message: &turn.persona.welcome_message,
        };

        let url = format!("{}/agents/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ConversationError::Api { status, message });
        }

        let raw_reply = response.text().await?;
        let body: CompletionsResponse = serde_json::from_str(&raw_reply)
            .map_err(|err| ConversationError::MalformedResponse(err.to_string()))?;

        // The service may assign its own conversation id; prefer that over
        // the one we sent so the next turn lands in the same history.
        let chat_session_id = body
            .data
            .as_ref()
            .and_then(|data| data.chat_session_id.clone())
            .unwrap_or(chat_session_id);
        let prompt = AgentPrompt::from_response(&body).into_text();

        Ok(AgentExchange {
            prompt,
            raw_reply,
            chat_session_id,
        })
    }
}

/// Prompt content of an agent reply, parsed with explicit precedence.
///
/// The response shape varies by turn type: scripted assessment turns
/// populate `next_question`, free-form turns populate `reply`, and older
/// agent deployments populate `response`. Blank values are skipped so a
/// degenerate reply cannot produce an unspeakable empty prompt.
#[derive(Debug, PartialEq)]
enum AgentPrompt {
    NextQuestion(String),
    Reply(String),
    Response(String),
    Missing,
}

impl AgentPrompt {
    fn from_response(body: &CompletionsResponse) -> Self {
        if let Some(text) = non_blank(&body.next_question) {
            return AgentPrompt::NextQuestion(text);
        }
        if let Some(text) = non_blank(&body.reply) {
            return AgentPrompt::Reply(text);
        }
        if let Some(text) = non_blank(&body.response) {
            return AgentPrompt::Response(text);
        }
        AgentPrompt::Missing
    }

    fn into_text(self) -> String {
        match self {
            AgentPrompt::NextQuestion(text)
            | AgentPrompt::Reply(text)
            | AgentPrompt::Response(text) => text,
            AgentPrompt::Missing => FALLBACK_ACKNOWLEDGEMENT.to_string(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Serialize)]
struct CompletionsRequest<'a> {
    user_reply: &'a str,
    course_id: &'a str,
    user_id: &'a str,
    user_name: &'a str,
    chat_session_id: &'a str,
    doctor_name: &'a str,
    doctor_avatar: &'a str,
    doctor_tone: &'a str,
    doctor_mood: &'a str,
    message_id: &'a str,
    welcome_message: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    next_question: Option<String>,
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    data: Option<CompletionsData>,
}

#[derive(Debug, Deserialize)]
struct CompletionsData {
    #[serde(default)]
    chat_session_id: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
