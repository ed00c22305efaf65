//! Error types for executor RPC calls.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur talking to the execution service.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The service could not be reached.
    #[error("Executor unreachable: {0}")]
    Transport(String),

    /// The call did not complete in time.
    #[error("Executor call timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with a non-success status.
    #[error("Executor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Invalid executor response: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("Invalid executor configuration: {0}")]
    Config(String),
}

impl ExecutorError {
    /// Map a reqwest failure, distinguishing timeouts.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ExecutorError::Timeout(timeout)
        } else if err.is_decode() {
            ExecutorError::Decode(err.to_string())
        } else {
            ExecutorError::Transport(err.to_string())
        }
    }
}

/// Result type for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
