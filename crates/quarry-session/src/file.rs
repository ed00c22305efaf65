//! File-backed session store.
//!
//! Each session is one `<id>.json` file holding the value and its deadline,
//! so sessions survive a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{SessionStore, validate_session_id};

/// On-disk record for one session.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    value: String,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionFile {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session store that writes one JSON file per session under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file session store");
        Ok(Self { dir })
    }

    /// Directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    /// Read a record, removing it if its window has closed.
    async fn read_live(&self, session_id: &str) -> Result<Option<SessionFile>> {
        let path = self.path_for(session_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: SessionFile = serde_json::from_slice(&raw)?;
        if record.is_expired(Utc::now()) {
            debug!(session_id = %session_id, "Session expired, removing");
            remove_if_present(&path).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(tmp, bytes).await?;
    tokio::fs::rename(tmp, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<String>> {
        validate_session_id(session_id)?;
        Ok(self.read_live(session_id).await?.map(|record| record.value))
    }

    async fn set(&self, session_id: &str, value: String, ttl: Duration) -> Result<()> {
        validate_session_id(session_id)?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::Backend(format!("ttl out of range: {e}")))?;
        let now = Utc::now();
        let record = SessionFile {
            value,
            written_at: now,
            expires_at: now + ttl,
        };

        // write-then-rename so readers never see a partial file; the temp
        // name is unique per write so concurrent writers each rename their
        // own file and the last rename wins
        let path = self.path_for(session_id);
        let tmp = self
            .dir
            .join(format!(".{session_id}.{}.json.tmp", Uuid::new_v4()));
        if let Err(e) = write_and_rename(&tmp, &path, &serde_json::to_vec(&record)?).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let path = self.path_for(session_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        // a record that no longer decodes is removed but was never live
        let live = match serde_json::from_slice::<SessionFile>(&raw) {
            Ok(record) => !record.is_expired(Utc::now()),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Deleting malformed session file");
                false
            }
        };
        let removed = remove_if_present(&path).await?;
        Ok(live && removed)
    }

    async fn ttl_remaining(&self, session_id: &str) -> Result<Option<Duration>> {
        validate_session_id(session_id)?;
        let Some(record) = self.read_live(session_id).await? else {
            return Ok(None);
        };
        Ok((record.expires_at - Utc::now()).to_std().ok())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    continue;
                }
            };
            match serde_json::from_slice::<SessionFile>(&raw) {
                Ok(record) if record.is_expired(now) => {
                    if remove_if_present(&path).await? {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed session file");
                }
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86_400);

    async fn store() -> (FileSessionStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::open(tmp.path().join("sessions"))
            .await
            .unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_open_creates_dir() {
        let (store, _tmp) = store().await;
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _tmp) = store().await;
        store.set("s1", r#"{"entries":[]}"#.to_string(), DAY).await.unwrap();

        assert_eq!(
            store.get("s1").await.unwrap().as_deref(),
            Some(r#"{"entries":[]}"#)
        );
        assert!(store.dir().join("s1.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_last_one_wins() {
        let (store, _tmp) = store().await;
        let store = std::sync::Arc::new(store);
        let large = "x".repeat(20_000);
        let small = "y".to_string();

        for _ in 0..50 {
            let a = {
                let store = store.clone();
                let value = large.clone();
                tokio::spawn(async move { store.set("sess", value, DAY).await })
            };
            let b = {
                let store = store.clone();
                let value = small.clone();
                tokio::spawn(async move { store.set("sess", value, DAY).await })
            };
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let stored = store.get("sess").await.unwrap().unwrap();
            assert!(stored == large || stored == small);
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["sess.json".to_string()]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let (store, tmp) = store().await;
        store.set("s1", "v".to_string(), DAY).await.unwrap();
        drop(store);

        let reopened = FileSessionStore::open(tmp.path().join("sessions"))
            .await
            .unwrap();
        assert_eq!(reopened.get("s1").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_read() {
        let (store, _tmp) = store().await;
        store
            .set("s1", "v".to_string(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.get("s1").await.unwrap().is_none());
        assert!(!store.dir().join("s1.json").exists());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _tmp) = store().await;
        store.set("s1", "v".to_string(), DAY).await.unwrap();

        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let (store, _tmp) = store().await;
        store.set("s1", "v".to_string(), DAY).await.unwrap();

        let left = store.ttl_remaining("s1").await.unwrap().unwrap();
        assert!(left > Duration::from_secs(86_000));
        assert!(store.ttl_remaining("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (store, _tmp) = store().await;
        store
            .set("short", "v".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        store.set("long", "v".to_string(), DAY).await.unwrap();
        tokio::fs::write(store.dir().join("junk.json"), b"not json")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (store, _tmp) = store().await;
        tokio::fs::write(store.dir().join("bad.json"), b"{")
            .await
            .unwrap();

        assert!(matches!(
            store.get("bad").await,
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_corrupt_file() {
        let (store, _tmp) = store().await;
        let path = store.dir().join("bad.json");
        tokio::fs::write(&path, b"{").await.unwrap();

        assert!(!store.delete("bad").await.unwrap());
        assert!(!path.exists());
        assert!(store.get("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (store, _tmp) = store().await;
        assert!(matches!(
            store.set("../escape", "v".to_string(), DAY).await,
            Err(Error::InvalidId(_))
        ));
    }
}
