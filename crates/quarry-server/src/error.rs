//! Error types for the server.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quarry_agent::AgentError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Agent error.
    #[error("Agent error: {0}")]
    Agent(AgentError),

    /// Session store error.
    #[error("Session error: {0}")]
    Session(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AgentError> for ServerError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::InvalidSessionId(id) => {
                ServerError::BadRequest(format!("Invalid session id: {:?}", id))
            }
            AgentError::Session(msg) => ServerError::Session(msg),
            other => ServerError::Agent(other),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::Agent(AgentError::Llm(_)) => (StatusCode::BAD_GATEWAY, "model_error"),
            ServerError::Agent(AgentError::Compression(_)) => {
                (StatusCode::BAD_GATEWAY, "compression_error")
            }
            ServerError::Agent(_) => (StatusCode::INTERNAL_SERVER_ERROR, "agent_error"),
            ServerError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// The JSON body sent to clients.
    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.status_and_code().1.to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = self.to_body();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %body.message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %body.message, "Client error");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_llm::LlmError;

    #[test]
    fn test_agent_errors_map_to_statuses() {
        let cases = [
            (
                ServerError::from(AgentError::InvalidSessionId("../x".into())),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                ServerError::from(AgentError::Session("disk full".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "session_error",
            ),
            (
                ServerError::from(AgentError::Llm(LlmError::Backend("boom".into()))),
                StatusCode::BAD_GATEWAY,
                "model_error",
            ),
            (
                ServerError::from(AgentError::compression("no reply")),
                StatusCode::BAD_GATEWAY,
                "compression_error",
            ),
            (
                ServerError::from(AgentError::internal("oops")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "agent_error",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_and_code(), (status, code), "{error}");
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ServerError::NotFound("Session abc not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "not_found");
        assert!(error.message.contains("abc"));
    }
}
