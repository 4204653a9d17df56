//! Conversational agent integration.
//!
//! One exchange sends the user's utterance, with persona and course
//! context attached, to the agent service and returns the prompt the
//! avatar speaks next together with the chat session id that threads
//! subsequent turns into the same remote conversation.

mod client;
mod error;

pub use client::{AgentClient, AgentService};
pub use error::{ConversationError, ConversationResult};

use crate::api::AvatarPersona;

/// Utterance sent on the user's behalf to open a conversation before
/// they have said anything themselves.
pub const OPENING_UTTERANCE: &str = "hi";

/// Spoken when the agent's reply carries no usable prompt text.
pub const FALLBACK_ACKNOWLEDGEMENT: &str = "Thank you. Let's continue with the assessment.";

/// One turn's worth of context for the agent service.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Identifier the agent scopes its source material by.
    pub course_id: String,
    pub user_id: String,
    pub user_name: String,
    /// What the user said this turn.
    pub utterance: String,
    pub persona: AvatarPersona,
    /// Remote conversation id from a previous turn, if any. When `None`
    /// the exchanger mints one; turns with distinct ids share no history.
    pub chat_session_id: Option<String>,
}

/// Outcome of one agent exchange.
#[derive(Debug, Clone)]
pub struct AgentExchange {
    /// Text the avatar speaks for this turn.
    pub prompt: String,
    /// Verbatim response body, kept for transcripts and diagnostics.
    pub raw_reply: String,
    /// Conversation id to reuse on the next turn.
    pub chat_session_id: String,
}
