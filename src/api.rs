//! Shared API types.
//!
//! Wire-level request/response bodies for the HTTP surface, plus the id
//! conventions used across the crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Prefix for assessment session IDs.
pub const SESSION_ID_PREFIX: &str = "session_";

/// Prefix for message IDs attached to conversation exchanges.
pub const MESSAGE_ID_PREFIX: &str = "msg_";

/// Prefix for chat session IDs minted locally when the conversational
/// service does not hand one back.
pub const CHAT_SESSION_ID_PREFIX: &str = "chat_";

/// Generate a new assessment session ID.
pub fn generate_session_id() -> String {
    format!("{}{}", SESSION_ID_PREFIX, Uuid::new_v4().simple())
}

/// Generate a new message ID.
pub fn generate_message_id() -> String {
    format!("{}{}", MESSAGE_ID_PREFIX, Uuid::new_v4().simple())
}

/// Generate a new chat session ID.
pub fn generate_chat_session_id() -> String {
    format!("{}{}", CHAT_SESSION_ID_PREFIX, Uuid::new_v4().simple())
}

// ============================================================================
// Session Status
// ============================================================================

/// Lifecycle status of an assessment session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    /// Ended by the user.
    Completed,
    /// Ended by the stale-session reaper.
    Cancelled,
}

impl SessionStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Persona
// ============================================================================

/// Immutable-once-set description of the avatar character.
///
/// Parameterizes both remote systems: the streaming provider renders
/// `avatar_id` with `voice`, and the conversational service speaks as
/// `display_name` with the given tone and mood, so the user meets one
/// consistent character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarPersona {
    /// Provider-side avatar identifier.
    pub avatar_id: String,
    /// Name the character presents as in conversation.
    pub display_name: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub voice: VoiceSettings,
}

impl AvatarPersona {
    /// First required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.avatar_id.trim().is_empty() {
            return Some("avatar_id");
        }
        if self.display_name.trim().is_empty() {
            return Some("display_name");
        }
        None
    }
}

/// Voice parameters forwarded to the streaming provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

// ============================================================================
// Requests / Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub assessment_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Course context the conversational service scopes its material by.
    /// Defaults to `assessment_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub persona: AvatarPersona,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub stream_endpoint: String,
    /// Provider token for joining the stream. Absent on resumed sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub opening_prompt: String,
    pub status: SessionStatus,
    /// Whether the streaming session is a locally synthesized substitute.
    pub is_mock: bool,
    /// Whether an already-active session was handed back instead of a new
    /// one being created.
    pub resumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTurnRequest {
    pub utterance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTurnResponse {
    /// The prompt the avatar speaks next.
    pub prompt: String,
    /// Remote conversation id; reused across the session's turns.
    pub chat_session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub assessment_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub stream_is_mock: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

// ============================================================================
// Tests
// ============================================================================
