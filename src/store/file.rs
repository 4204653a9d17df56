//! File-based session record store.
//!
//! One JSON document per session:
//!
//! ```text
//! {sessions_dir}/
//!   {session_id}.json
//! ```
//!
//! All writes go through a temp file and an atomic rename, so a crash
//! leaves either the previous record or the new one, never a torn file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::warn;

use crate::api::SessionStatus;
use crate::sync::{KeyedLocks, pair_key};

use super::{AssessmentSession, LOCK_MAX_IDLE, SessionStore, StoreError, StoreResult};

/// File-based implementation of `SessionStore`.
///
/// The sessions directory is created on first write.
#[derive(Debug)]
pub struct FileSessionStore {
    sessions_dir: PathBuf,
    creation_locks: KeyedLocks,
}

impl FileSessionStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            creation_locks: KeyedLocks::new(),
        }
    }

    /// Record file path for a session id.
    fn record_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{id}.json"))
    }

    /// Caller-supplied ids reach the filesystem, so anything that could
    /// name a path outside the store directory is not a record id.
    fn is_record_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    async fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.sessions_dir)
            .await
            .map_err(|e| StoreError::file_io(&self.sessions_dir, e))
    }

    async fn load_record(&self, path: &Path) -> StoreResult<Option<AssessmentSession>> {
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::file_io(path, e)),
        };

        let record: AssessmentSession = serde_json::from_str(&contents)
            .map_err(|e| StoreError::file_deserialization(path, e.to_string()))?;
        Ok(Some(record))
    }

    async fn write_record(&self, record: &AssessmentSession) -> StoreResult<()> {
        self.ensure_dir().await?;

        let final_path = self.record_path(&record.id);
        let temp_path = self.sessions_dir.join(format!("{}.json.tmp", record.id));

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::serialization(e.to_string()))?;

        // Write to temp file first
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StoreError::file_io(&temp_path, e))?;

        // Atomic rename
        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| StoreError::file_io(&final_path, e))?;

        Ok(())
    }

    /// Load every record in the store directory.
    ///
    /// Malformed files are skipped (crash recovery), not fatal.
    async fn scan(&self) -> StoreResult<Vec<AssessmentSession>> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&self.sessions_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(StoreError::file_io(&self.sessions_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::file_io(&self.sessions_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let contents = match fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::file_io(&path, e)),
            };
            match serde_json::from_str::<AssessmentSession>(&contents) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping malformed session record",
                    );
                }
            }
        }

        Ok(records)
    }

    async fn active_record(
        &self,
        assessment_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<AssessmentSession>> {
        let records = self.scan().await?;
        Ok(records.into_iter().find(|record| {
            record.is_active() && record.assessment_id == assessment_id && record.user_id == user_id
        }))
    }

    async fn transition(&self, id: &str, status: SessionStatus) -> StoreResult<AssessmentSession> {
        if !Self::is_record_id(id) {
            return Err(StoreError::not_found(id));
        }
        let path = self.record_path(id);
        let mut record = self
            .load_record(&path)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;

        if !record.status.is_terminal() {
            record.status = status;
            record.ended_at = Some(Utc::now());
            self.write_record(&record).await?;
        }
        Ok(record)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn find_active(
        &self,
        assessment_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<AssessmentSession>> {
        self.active_record(assessment_id, user_id).await
    }

    async fn create_active(&self, record: AssessmentSession) -> StoreResult<AssessmentSession> {
        let lock = self
            .creation_locks
            .get(&pair_key(&record.assessment_id, &record.user_id));
        let guard = lock.lock().await;

        if let Some(existing) = self
            .active_record(&record.assessment_id, &record.user_id)
            .await?
        {
            return Err(StoreError::already_active(existing));
        }
        self.write_record(&record).await?;
        drop(guard);

        // Sweep lock entries for pairs not seen in an hour.
        self.creation_locks.evict_idle(LOCK_MAX_IDLE);
        Ok(record)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AssessmentSession>> {
        if !Self::is_record_id(id) {
            return Ok(None);
        }
        self.load_record(&self.record_path(id)).await
    }

    async fn list(&self) -> StoreResult<Vec<AssessmentSession>> {
        let mut records = self.scan().await?;
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    async fn complete(&self, id: &str) -> StoreResult<AssessmentSession> {
        self.transition(id, SessionStatus::Completed).await
    }

    async fn cancel(&self, id: &str) -> StoreResult<AssessmentSession> {
        self.transition(id, SessionStatus::Cancelled).await
    }
}

// ============================================================================
// Tests
// ============================================================================
