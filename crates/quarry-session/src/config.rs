//! Configuration for session stores.

use std::time::Duration;

/// Default maximum number of sessions held by the in-memory store.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default expiration window; each write restarts it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a session store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of sessions before LRU eviction (in-memory store only).
    pub max_sessions: usize,

    /// Expiration window applied on every write.
    pub ttl: Duration,

    /// Interval for the background sweep of expired sessions.
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl: DEFAULT_TTL,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions to hold.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the expiration window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
