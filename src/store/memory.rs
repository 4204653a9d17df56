//! In-memory session record store.
//!
//! Backs tests and embedded use. Same conditional-insert semantics as the
//! file store, with records held in a concurrent map.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::api::SessionStatus;
use crate::sync::{KeyedLocks, pair_key};

use super::{AssessmentSession, LOCK_MAX_IDLE, SessionStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: DashMap<String, AssessmentSession>,
    creation_locks: KeyedLocks,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_for(&self, assessment_id: &str, user_id: &str) -> Option<AssessmentSession> {
        self.records.iter().find_map(|entry| {
            let record = entry.value();
            (record.is_active()
                && record.assessment_id == assessment_id
                && record.user_id == user_id)
                .then(|| record.clone())
        })
    }

    fn transition(&self, id: &str, status: SessionStatus) -> StoreResult<AssessmentSession> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        if !entry.status.is_terminal() {
            entry.status = status;
            entry.ended_at = Some(Utc::now());
        }
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_active(
        &self,
        assessment_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<AssessmentSession>> {
        Ok(self.active_for(assessment_id, user_id))
    }

    async fn create_active(&self, record: AssessmentSession) -> StoreResult<AssessmentSession> {
        let lock = self
            .creation_locks
            .get(&pair_key(&record.assessment_id, &record.user_id));
        let guard = lock.lock().await;

        if let Some(existing) = self.active_for(&record.assessment_id, &record.user_id) {
            return Err(StoreError::already_active(existing));
        }
        self.records.insert(record.id.clone(), record.clone());
        drop(guard);

        self.creation_locks.evict_idle(LOCK_MAX_IDLE);
        Ok(record)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AssessmentSession>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> StoreResult<Vec<AssessmentSession>> {
        let mut records: Vec<AssessmentSession> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    async fn complete(&self, id: &str) -> StoreResult<AssessmentSession> {
        self.transition(id, SessionStatus::Completed)
    }

    async fn cancel(&self, id: &str) -> StoreResult<AssessmentSession> {
        self.transition(id, SessionStatus::Cancelled)
    }
}

// ============================================================================
// Tests
// ============================================================================
