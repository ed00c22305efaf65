//! Session management endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use quarry_agent::SessionSnapshot;

use crate::error::ServerError;
use crate::state::AppState;

/// GET /api/v1/sessions/{id} - Get the stored transcript and remaining TTL.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    state
        .orchestrator
        .session(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Session {} not found", session_id)))
}

/// DELETE /api/v1/sessions/{id} - Delete a session.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if state.orchestrator.delete_session(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!(
            "Session {} not found",
            session_id
        )))
    }
}
