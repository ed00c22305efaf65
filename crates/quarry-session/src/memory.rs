//! In-memory session store with LRU eviction and expiration.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::store::{SessionStore, validate_session_id};
use crate::ttl::TtlTracker;

/// Entry stored in memory.
#[derive(Debug, Clone)]
struct StoredSession {
    value: String,
    updated_at: DateTime<Utc>,
}

/// Inner state protected by a mutex. No lock is held across an await.
struct StoreInner {
    lru: LruCache<String, StoredSession>,
    ttl: TtlTracker,
}

impl StoreInner {
    /// Drop the session if its window has closed. Returns true if it was live.
    fn evict_if_expired(&mut self, session_id: &str) -> bool {
        if self.ttl.is_expired(session_id) {
            if self.lru.pop(session_id).is_some() {
                debug!(session_id = %session_id, "Session expired, removing");
            }
            self.ttl.remove(session_id);
            false
        } else {
            true
        }
    }
}

/// Session store kept in process memory.
///
/// Bounded by `max_sessions`; when full, the least recently used session is
/// evicted. Contents are lost on restart; use
/// [`FileSessionStore`](crate::FileSessionStore) to survive restarts.
pub struct MemorySessionStore {
    inner: Mutex<StoreInner>,
    config: StoreConfig,
}

impl MemorySessionStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(StoreInner {
                lru: LruCache::new(cap),
                ttl: TtlTracker::new(),
            }),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of sessions currently held (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// When the session was last written, if it is live.
    pub fn last_write_time(&self, session_id: &str) -> Option<DateTime<Utc>> {
        let mut inner = self.inner.lock();
        if !inner.evict_if_expired(session_id) {
            return None;
        }
        inner.lru.peek(session_id).map(|s| s.updated_at)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<String>> {
        validate_session_id(session_id)?;
        let mut inner = self.inner.lock();

        if !inner.evict_if_expired(session_id) {
            return Ok(None);
        }

        let value = inner.lru.get(session_id).map(|s| s.value.clone());
        trace!(session_id = %session_id, hit = value.is_some(), "Session lookup");
        Ok(value)
    }

    async fn set(&self, session_id: &str, value: String, ttl: Duration) -> Result<()> {
        validate_session_id(session_id)?;
        let mut inner = self.inner.lock();

        let entry = StoredSession {
            value,
            updated_at: Utc::now(),
        };

        if let Some((evicted_id, _)) = inner.lru.push(session_id.to_string(), entry)
            && evicted_id != session_id
        {
            debug!(session_id = %evicted_id, "Evicting LRU session to make room");
            inner.ttl.remove(&evicted_id);
        }
        inner.ttl.touch(session_id, ttl);

        trace!(
            session_id = %session_id,
            sessions = inner.lru.len(),
            "Session written"
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let mut inner = self.inner.lock();

        let live = !inner.ttl.is_expired(session_id);
        inner.ttl.remove(session_id);
        let existed = inner.lru.pop(session_id).is_some();

        Ok(existed && live)
    }

    async fn ttl_remaining(&self, session_id: &str) -> Result<Option<Duration>> {
        validate_session_id(session_id)?;
        let mut inner = self.inner.lock();

        if !inner.evict_if_expired(session_id) || !inner.lru.contains(session_id) {
            return Ok(None);
        }
        Ok(inner.ttl.remaining(session_id))
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let expired = inner.ttl.drain_expired();
        let mut removed = 0;
        for session_id in expired {
            if inner.lru.pop(&session_id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemorySessionStore::default();
        store.set("s1", "[1,2]".to_string(), DAY).await.unwrap();

        assert_eq!(store.get("s1").await.unwrap().as_deref(), Some("[1,2]"));
        assert!(store.last_write_time("s1").is_some());
    }

    #[tokio::test]
    async fn test_unknown_session_is_absent() {
        let store = MemorySessionStore::default();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.ttl_remaining("nope").await.unwrap().is_none());
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let store = MemorySessionStore::default();
        store.set("s1", "first".to_string(), DAY).await.unwrap();
        store.set("s1", "second".to_string(), DAY).await.unwrap();

        assert_eq!(store.get("s1").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_reads_absent() {
        let store = MemorySessionStore::default();
        store
            .set("s1", "v".to_string(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("s1").await.unwrap().is_none());
        assert!(store.ttl_remaining("s1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_write_resets_ttl_but_read_does_not() {
        let store = MemorySessionStore::default();
        store
            .set("s1", "v".to_string(), Duration::from_millis(80))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // a read must not extend the window
        assert!(store.get("s1").await.unwrap().is_some());
        store
            .set("s1", "v2".to_string(), Duration::from_millis(80))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // 100ms since the first write, 50ms since the second
        assert_eq!(store.get("s1").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let store = MemorySessionStore::default();
        store.set("s1", "v".to_string(), DAY).await.unwrap();

        let left = store.ttl_remaining("s1").await.unwrap().unwrap();
        assert!(left > Duration::from_secs(86_000));
        assert!(left <= DAY);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemorySessionStore::default();
        store.set("s1", "v".to_string(), DAY).await.unwrap();

        assert!(store.delete("s1").await.unwrap());
        assert!(store.get("s1").await.unwrap().is_none());
        assert!(!store.delete("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let store = MemorySessionStore::new(StoreConfig::new().with_max_sessions(2));
        store.set("a", "1".to_string(), DAY).await.unwrap();
        store.set("b", "2".to_string(), DAY).await.unwrap();

        // touch "a" so "b" becomes least recently used
        store.get("a").await.unwrap();
        store.set("c", "3".to_string(), DAY).await.unwrap();

        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("c").await.unwrap().is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemorySessionStore::default();
        store
            .set("short", "v".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        store.set("long", "v".to_string(), DAY).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_id() {
        let store = MemorySessionStore::default();
        assert!(store.set("../x", "v".to_string(), DAY).await.is_err());
        assert!(store.get("").await.is_err());
    }
}
