//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiState;
use crate::models::input::GenerationInput;
use crate::models::queue::QueueStatus;
use crate::models::session::{GenerationSession, SessionStatus};
use crate::orchestrator::cancellation::{CancelAllSummary, CancelOutcome};
use crate::{AppError, Result};

/// `POST /sessions` response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Created {
    /// New session ID.
    pub id: String,
}

/// `POST /sessions/{id}/cancel` response.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// What the cancel did.
    pub outcome: CancelOutcome,
}

/// `GET /sessions` query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Optional status filter.
    pub status: Option<String>,
}

/// `GET /health`.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /queue`.
pub async fn queue_status(State(state): State<ApiState>) -> Json<QueueStatus> {
    Json(state.scheduler.queue_status())
}

/// `POST /sessions`.
///
/// Empty fixed hashtags are filled from the configured defaults before
/// the input is captured.
///
/// # Errors
///
/// Returns `AppError::Validation` for an unreadable body or invalid input.
pub async fn create_session(
    State(state): State<ApiState>,
    body: std::result::Result<Json<GenerationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>)> {
    let Json(mut input) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    if input.fixed_hashtags.is_empty() {
        input
            .fixed_hashtags
            .clone_from(&state.defaults.default_fixed_hashtags);
    }

    let id = state.scheduler.enqueue(input)?;
    info!(session_id = %id, "session enqueued over HTTP");
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// `GET /sessions[?status=]`.
///
/// # Errors
///
/// Returns `AppError::Validation` for an unknown status filter.
pub async fn list_sessions(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GenerationSession>>> {
    let store = state.scheduler.store();
    let sessions = match query.status.as_deref() {
        Some(raw) => store.list_by_status(raw.parse::<SessionStatus>()?),
        None => store.list(),
    };
    Ok(Json(sessions))
}

/// `GET /sessions/{id}`.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown ID.
pub async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<GenerationSession>> {
    state.scheduler.store().get(&id).map(Json)
}

/// `POST /sessions/{id}/cancel`.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown ID.
pub async fn cancel_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>> {
    let outcome = state.scheduler.cancel(&id)?;
    Ok(Json(CancelResponse { outcome }))
}

/// `POST /sessions/cancel-all`.
pub async fn cancel_all(State(state): State<ApiState>) -> Json<CancelAllSummary> {
    Json(state.scheduler.cancel_all())
}
