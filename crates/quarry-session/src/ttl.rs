//! Deadline tracking for session expiration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks expiration deadlines per session.
///
/// A deadline is set on write and is not extended by reads.
#[derive(Debug, Default)]
pub struct TtlTracker {
    deadlines: HashMap<String, Instant>,
}

impl TtlTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the expiration window for a session.
    pub fn touch(&mut self, session_id: &str, ttl: Duration) {
        self.deadlines
            .insert(session_id.to_string(), Instant::now() + ttl);
    }

    /// Check if a session has expired. Untracked sessions count as expired.
    pub fn is_expired(&self, session_id: &str) -> bool {
        match self.deadlines.get(session_id) {
            None => true,
            Some(deadline) => Instant::now() >= *deadline,
        }
    }

    /// Time left before the session expires, if it is live.
    pub fn remaining(&self, session_id: &str) -> Option<Duration> {
        self.deadlines
            .get(session_id)
            .and_then(|deadline| deadline.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Remove tracking for a session.
    pub fn remove(&mut self, session_id: &str) {
        self.deadlines.remove(session_id);
    }

    /// Remove all expired entries and return their IDs.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }

    /// Get the number of tracked sessions.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Check if there are no tracked sessions.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
