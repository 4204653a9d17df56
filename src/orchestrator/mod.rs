//! Session orchestration.
//!
//! Drives one assessment session from credential acquisition through
//! streaming session creation and start, the opening conversation
//! exchange, and the persisted active record, then per-turn
//! exchange-and-speak cycles, and finally teardown. An orchestrator holds
//! no global state: everything cross-session lives behind the store
//! handle it is given, so several orchestrators can run in isolation.

mod error;

pub use error::OrchestratorError;

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::api::{
    SendTurnRequest, SendTurnResponse, SessionStatus, StartSessionRequest, StartSessionResponse,
    generate_session_id,
};
use crate::conversation::{AgentService, OPENING_UTTERANCE, TurnContext};
use crate::store::{AssessmentSession, SessionStore, StoreError};
use crate::streaming::{ResilientStreaming, StreamingCredential, StreamingSession};

pub struct Orchestrator {
    streaming: ResilientStreaming,
    agent: Arc<dyn AgentService>,
    store: Arc<dyn SessionStore>,
    /// Remote chat session ids for active sessions, keyed by session id.
    /// Deliberately not persisted; the record never mutates for turns.
    chat_sessions: DashMap<String, String>,
}

impl Orchestrator {
    pub fn new(
        streaming: ResilientStreaming,
        agent: Arc<dyn AgentService>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            streaming,
            agent,
            store,
            chat_sessions: DashMap::new(),
        }
    }

    /// Start an assessment session, or hand back the pair's existing
    /// active one.
    ///
    /// The remote chain runs in order: credential, streaming session
    /// create and start, opening conversation exchange, then the atomic
    /// record insert. Losing the insert race discards the just-created
    /// streaming session and resumes the winner's, so starting is
    /// idempotent from the caller's perspective.
    pub async fn start(
        &self,
        request: StartSessionRequest,
    ) -> Result<StartSessionResponse, OrchestratorError> {
        if request.assessment_id.trim().is_empty() {
            return Err(OrchestratorError::validation(
                "assessment_id must not be empty",
            ));
        }
        if request.user_id.trim().is_empty() {
            return Err(OrchestratorError::validation("user_id must not be empty"));
        }
        if let Some(field) = request.persona.missing_field() {
            return Err(OrchestratorError::validation(format!(
                "persona.{field} must not be empty"
            )));
        }

        // Rejoin fast path: an existing active session is handed back
        // without touching either remote.
        if let Some(existing) = self
            .store
            .find_active(&request.assessment_id, &request.user_id)
            .await?
        {
            info!(
                session_id = %existing.id,
                assessment_id = %request.assessment_id,
                user_id = %request.user_id,
                "resuming active session",
            );
            return Ok(Self::resumed_response(existing));
        }

        let course_id = request
            .course_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&request.assessment_id)
            .to_string();
        let user_name = request
            .user_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&request.user_id)
            .to_string();

        let credential = self.streaming.issue_credential().await?;
        let stream = self
            .streaming
            .create_session(&credential, &request.persona.avatar_id, &request.persona.voice)
            .await?;
        self.streaming.start_session(&credential, &stream).await?;

        // Opening exchange. An agent failure here fails the whole start,
        // and the streaming session just created is discarded.
        let opening = match self
            .agent
            .exchange(&TurnContext {
                course_id: course_id.clone(),
                user_id: request.user_id.clone(),
                user_name: user_name.clone(),
                utterance: OPENING_UTTERANCE.to_string(),
                persona: request.persona.clone(),
                chat_session_id: None,
            })
            .await
        {
            Ok(exchange) => exchange,
            Err(err) => {
                self.discard_streaming_session(&credential, &stream).await;
                return Err(err.into());
            }
        };

        let record = AssessmentSession {
            id: generate_session_id(),
            assessment_id: request.assessment_id.clone(),
            user_id: request.user_id.clone(),
            course_id,
            user_name,
            streaming_session_id: stream.session_id.clone(),
            stream_endpoint: stream.stream_endpoint.clone(),
            stream_is_mock: stream.is_mock,
            status: SessionStatus::Active,
            persona: request.persona.clone(),
            opening_prompt: opening.prompt.clone(),
            started_at: Utc::now(),
            ended_at: None,
        };

        let record = match self.store.create_active(record).await {
            Ok(record) => record,
            Err(StoreError::AlreadyActive { existing }) => {
                info!(
                    session_id = %existing.id,
                    assessment_id = %request.assessment_id,
                    user_id = %request.user_id,
                    "lost creation race, resuming winner's session",
                );
                self.discard_streaming_session(&credential, &stream).await;
                return Ok(Self::resumed_response(*existing));
            }
            Err(err) => {
                self.discard_streaming_session(&credential, &stream).await;
                return Err(err.into());
            }
        };

        self.chat_sessions
            .insert(record.id.clone(), opening.chat_session_id);

        // The avatar greets with the opening prompt. Failure here degrades
        // the greeting, it does not undo the started session.
        if let Err(err) = self
            .streaming
            .speak(&credential, &stream, &record.opening_prompt)
            .await
        {
            warn!(session_id = %record.id, error = %err, "failed to speak opening prompt");
        }

        info!(
            session_id = %record.id,
            streaming_session_id = %record.streaming_session_id,
            stream_is_mock = record.stream_is_mock,
            "assessment session started",
        );

        Ok(StartSessionResponse {
            session_id: record.id,
            stream_endpoint: record.stream_endpoint,
            access_token: stream.access_token,
            opening_prompt: record.opening_prompt,
            status: record.status,
            is_mock: record.stream_is_mock,
            resumed: false,
        })
    }

    /// Run one conversation turn: exchange the utterance with the agent,
    /// then have the avatar speak the resulting prompt.
    ///
    /// Agent failures are surfaced and leave the session state untouched;
    /// the turn can simply be retried.
    pub async fn send_turn(
        &self,
        session_id: &str,
        request: SendTurnRequest,
    ) -> Result<SendTurnResponse, OrchestratorError> {
        if request.utterance.trim().is_empty() {
            return Err(OrchestratorError::validation("utterance must not be empty"));
        }

        let record = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::unknown_session(session_id))?;
        if record.status.is_terminal() {
            return Err(OrchestratorError::session_ended(session_id));
        }

        let chat_session_id = self
            .chat_sessions
            .get(&record.id)
            .map(|entry| entry.value().clone());

        let exchange = self
            .agent
            .exchange(&TurnContext {
                course_id: record.course_id.clone(),
                user_id: record.user_id.clone(),
                user_name: record.user_name.clone(),
                utterance: request.utterance.clone(),
                persona: record.persona.clone(),
                chat_session_id,
            })
            .await?;
        self.chat_sessions
            .insert(record.id.clone(), exchange.chat_session_id.clone());

        // Credentials are not cached across calls; each turn gets its own.
        let credential = self.streaming.issue_credential().await?;
        let stream = Self::stream_handle(&record);
        let receipt = self
            .streaming
            .speak(&credential, &stream, &exchange.prompt)
            .await?;
        debug!(
            session_id = %record.id,
            task_id = %receipt.task_id,
            task_is_mock = receipt.is_mock,
            "avatar speak task submitted",
        );

        Ok(SendTurnResponse {
            prompt: exchange.prompt,
            chat_session_id: exchange.chat_session_id,
        })
    }

    /// End a session: stop the avatar stream (best-effort) and mark the
    /// record completed. Ending an already-ended session succeeds without
    /// doing anything.
    pub async fn end(&self, session_id: &str) -> Result<AssessmentSession, OrchestratorError> {
        let record = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::unknown_session(session_id))?;
        if record.status.is_terminal() {
            self.chat_sessions.remove(&record.id);
            return Ok(record);
        }

        self.shutdown_stream(&record).await;

        let record = self.store.complete(&record.id).await?;
        self.chat_sessions.remove(&record.id);
        info!(session_id = %record.id, "assessment session completed");
        Ok(record)
    }

    /// Fetch a session record.
    pub async fn get(&self, session_id: &str) -> Result<AssessmentSession, OrchestratorError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::unknown_session(session_id))
    }

    /// All session records, newest first.
    pub async fn list(&self) -> Result<Vec<AssessmentSession>, OrchestratorError> {
        Ok(self.store.list().await?)
    }

    /// Cancel active sessions older than `max_age`, stopping their
    /// streams. Returns how many were cancelled.
    ///
    /// Run periodically so sessions abandoned without an explicit end do
    /// not stay active (and streaming) forever.
    pub async fn expire_stale(&self, max_age: Duration) -> Result<usize, OrchestratorError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return Ok(0);
        };

        let mut cancelled = 0;
        for record in self.store.list().await? {
            if !record.is_active() || record.started_at > cutoff {
                continue;
            }
            self.shutdown_stream(&record).await;
            match self.store.cancel(&record.id).await {
                Ok(_) => {
                    self.chat_sessions.remove(&record.id);
                    info!(session_id = %record.id, "cancelled stale session");
                    cancelled += 1;
                }
                Err(err) => {
                    warn!(
                        session_id = %record.id,
                        error = %err,
                        "failed to cancel stale session",
                    );
                }
            }
        }
        Ok(cancelled)
    }

    /// In-memory handle for a record's remote streaming session.
    fn stream_handle(record: &AssessmentSession) -> StreamingSession {
        StreamingSession {
            session_id: record.streaming_session_id.clone(),
            stream_endpoint: record.stream_endpoint.clone(),
            access_token: None,
            is_mock: record.stream_is_mock,
        }
    }

    fn resumed_response(record: AssessmentSession) -> StartSessionResponse {
        StartSessionResponse {
            session_id: record.id,
            stream_endpoint: record.stream_endpoint,
            access_token: None,
            opening_prompt: record.opening_prompt,
            status: record.status,
            is_mock: record.stream_is_mock,
            resumed: true,
        }
    }

    /// Best-effort stop for a just-created streaming session that will
    /// not be used. A failed stop means the session lingers remotely, so
    /// its id is logged for cleanup.
    async fn discard_streaming_session(
        &self,
        credential: &StreamingCredential,
        stream: &StreamingSession,
    ) {
        if let Err(err) = self.streaming.stop_session(credential, stream).await {
            error!(
                streaming_session_id = %stream.session_id,
                error = %err,
                "failed to stop discarded streaming session",
            );
        }
    }

    /// Best-effort stop of a record's streaming session.
    async fn shutdown_stream(&self, record: &AssessmentSession) {
        let credential = match self.streaming.issue_credential().await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(
                    streaming_session_id = %record.streaming_session_id,
                    error = %err,
                    "could not issue credential to stop streaming session",
                );
                return;
            }
        };
        let stream = Self::stream_handle(record);
        if let Err(err) = self.streaming.stop_session(&credential, &stream).await {
            warn!(
                streaming_session_id = %record.streaming_session_id,
                error = %err,
                "failed to stop streaming session",
            );
        }
    }
}
