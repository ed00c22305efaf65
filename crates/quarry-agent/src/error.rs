//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
///
/// Only model failures, compression failures, and session write failures
/// escape the step loop. Tool failures are folded into the transcript as
/// ordinary tool output and never surface here.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] quarry_llm::LlmError),

    /// The history summarization call failed.
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Invalid tool parameters.
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParams(String),

    /// Session store error.
    #[error("Session error: {0}")]
    Session(String),

    /// A client-supplied session ID is unusable.
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a compression error.
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<quarry_session::Error> for AgentError {
    fn from(err: quarry_session::Error) -> Self {
        match err {
            quarry_session::Error::InvalidId(id) => Self::InvalidSessionId(id),
            other => Self::Session(other.to_string()),
        }
    }
}

impl From<quarry_executor::ExecutorError> for AgentError {
    fn from(err: quarry_executor::ExecutorError) -> Self {
        Self::Tool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::tool("failed to read file");
        assert!(err.to_string().contains("Tool error"));
        assert!(err.to_string().contains("failed to read file"));
    }

    #[test]
    fn test_session_error_conversion() {
        let err: AgentError = quarry_session::Error::InvalidId("../x".to_string()).into();
        assert!(matches!(err, AgentError::InvalidSessionId(_)));
        assert!(err.to_string().contains("../x"));

        let err: AgentError = quarry_session::Error::Backend("refused".to_string()).into();
        assert!(matches!(err, AgentError::Session(_)));
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: AgentError = quarry_llm::LlmError::Backend("upstream down".to_string()).into();
        assert!(matches!(err, AgentError::Llm(_)));
    }
}
