//! Session persistence for Quarry conversations.
//!
//! A session is an opaque serialized transcript stored under a caller-chosen
//! id with an expiration window. Every write restarts the window; reads do
//! not. Two backends are provided:
//!
//! - [`MemorySessionStore`]: process-local, LRU-bounded
//! - [`FileSessionStore`]: one JSON file per session, survives restarts
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry_session::{MemorySessionStore, SessionStore, StoreConfig};
//!
//! let store = MemorySessionStore::new(StoreConfig::default().with_max_sessions(1000));
//! store.set("session-1", transcript_json, DEFAULT_TTL).await?;
//! ```

mod config;
mod error;
mod file;
mod memory;
mod store;
mod ttl;

pub use config::{DEFAULT_MAX_SESSIONS, DEFAULT_TTL, StoreConfig};
pub use error::{Error, Result};
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use store::{
    MAX_SESSION_ID_LEN, SessionStore, SharedSessionStore, spawn_cleanup_task,
    validate_session_id,
};
pub use ttl::TtlTracker;
