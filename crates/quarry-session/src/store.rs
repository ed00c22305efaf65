//! The session store interface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Longest session id accepted as a storage key.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Key-value persistence for conversation transcripts, with expiration.
///
/// Values are opaque serialized transcripts. Every `set` restarts the
/// session's expiration window; reads do not. There is no compare-and-swap:
/// two writers for the same id race and the last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session value. Expired or unknown ids read as `None`.
    async fn get(&self, session_id: &str) -> Result<Option<String>>;

    /// Store a session value and restart its expiration window.
    async fn set(&self, session_id: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove a session. Returns whether a live session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Time left before the session expires, or `None` if it is not live.
    async fn ttl_remaining(&self, session_id: &str) -> Result<Option<Duration>>;

    /// Sweep expired sessions, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// A store that can be shared across tasks.
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Check that a session id is usable as a storage key.
///
/// Accepts 1 to [`MAX_SESSION_ID_LEN`] characters from `[A-Za-z0-9_-]`,
/// which covers UUIDs and keeps ids safe as file names.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidId(session_id.to_string()))
    }
}

/// Spawn a task that sweeps expired sessions every `interval`.
pub fn spawn_cleanup_task(
    store: SharedSessionStore,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(store = store.name(), removed, "Swept expired sessions")
                }
                Err(e) => {
                    tracing::warn!(store = store.name(), error = %e, "Session sweep failed")
                }
            }
        }
    })
}
