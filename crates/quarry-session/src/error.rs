//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session id cannot be used as a storage key.
    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    /// Filesystem error from a file-backed store.
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from an external storage backend.
    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
