//! Session record storage.
//!
//! The record store is the single point of cross-session synchronization:
//! the at-most-one-active invariant per (assessment, user) pair is
//! enforced here by an atomic conditional insert, never by callers
//! checking first and inserting after.
//!
//! Two backends share one trait: a durable file-backed store (the server
//! default) and an in-memory store for tests and embedding.

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{AvatarPersona, SessionStatus};

/// Creation locks for pairs idle this long are swept opportunistically.
const LOCK_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Durable record of one assessment session.
///
/// Mutated only to transition `status` and stamp `ended_at`;
/// `streaming_session_id` never changes after creation. The remote chat
/// session id is deliberately not part of the record: it lives in the
/// orchestrator's in-process cache for the lifetime of the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub id: String,
    pub assessment_id: String,
    pub user_id: String,
    /// Course context id the conversational service scopes its material by.
    pub course_id: String,
    pub user_name: String,
    pub streaming_session_id: String,
    pub stream_endpoint: String,
    pub stream_is_mock: bool,
    pub status: SessionStatus,
    pub persona: AvatarPersona,
    pub opening_prompt: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl AssessmentSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Storage interface for assessment session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether an active record exists for this (assessment, user) pair.
    async fn has_active(&self, assessment_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self.find_active(assessment_id, user_id).await?.is_some())
    }

    /// The active record for this (assessment, user) pair, if any.
    async fn find_active(
        &self,
        assessment_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<AssessmentSession>>;

    /// Insert `record` as its pair's active session.
    ///
    /// The active check and the insert form one atomic unit. A concurrent
    /// creation for the same pair loses with [`StoreError::AlreadyActive`]
    /// carrying the winner's record; a second active record is never
    /// written.
    async fn create_active(&self, record: AssessmentSession) -> StoreResult<AssessmentSession>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> StoreResult<Option<AssessmentSession>>;

    /// All records, newest first.
    async fn list(&self) -> StoreResult<Vec<AssessmentSession>>;

    /// Mark a record completed and stamp `ended_at`.
    ///
    /// Idempotent: a record already in a terminal status is returned
    /// unchanged.
    async fn complete(&self, id: &str) -> StoreResult<AssessmentSession>;

    /// Mark a record cancelled and stamp `ended_at`.
    ///
    /// The reaper's counterpart of [`SessionStore::complete`], with the
    /// same idempotency.
    async fn cancel(&self, id: &str) -> StoreResult<AssessmentSession>;
}
