//! Assessment session HTTP handlers.

use axum::Json;
use axum::extract::{Path as PathExtract, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::api::{ListSessionsResponse, SendTurnRequest, SessionSummary, StartSessionRequest};
use crate::handlers::problem_details;
use crate::orchestrator::OrchestratorError;
use crate::server::AppState;

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sessions
///
/// 201 for a newly started session, 200 when the pair's existing active
/// session is handed back.
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Response {
    match state.orchestrator.start(req).await {
        Ok(response) => {
            let status = if response.resumed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(response)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// POST /api/v1/sessions/{session_id}/turns
pub async fn send_turn(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
    Json(req): Json<SendTurnRequest>,
) -> Response {
    match state.orchestrator.send_turn(&session_id, req).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /api/v1/sessions/{session_id}/end
pub async fn end_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    match state.orchestrator.end(&session_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/v1/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Response {
    match state.orchestrator.list().await {
        Ok(records) => {
            let sessions: Vec<SessionSummary> = records
                .into_iter()
                .map(|record| SessionSummary {
                    id: record.id,
                    assessment_id: record.assessment_id,
                    user_id: record.user_id,
                    status: record.status,
                    stream_is_mock: record.stream_is_mock,
                    started_at: record.started_at,
                    ended_at: record.ended_at,
                })
                .collect();
            Json(ListSessionsResponse { sessions }).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// GET /api/v1/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    match state.orchestrator.get(&session_id).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Implementation Details
// ============================================================================

/// Map orchestration failures onto problem-details responses.
fn error_response(err: OrchestratorError) -> Response {
    match &err {
        OrchestratorError::Validation(detail) => problem_details::bad_request(detail.clone()),
        OrchestratorError::UnknownSession(_) => problem_details::not_found(err.to_string()),
        OrchestratorError::SessionEnded(_) => problem_details::conflict(err.to_string()),
        OrchestratorError::Streaming(_) | OrchestratorError::Conversation(_) => {
            error!(error = %err, "upstream service failure");
            problem_details::bad_gateway(err.to_string())
        }
        OrchestratorError::Store(_) => {
            error!(error = %err, "session store failure");
            problem_details::internal_error("session store failure")
        }
    }
}
