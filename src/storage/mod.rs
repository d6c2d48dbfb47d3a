//! Persistent stores used by the orchestration core.
//!
//! Two narrow contracts are exposed as traits so the gateway and the
//! pipeline runner never depend on a concrete backend:
//!
//! - [`CacheStore`]: content-addressed `key → text` for LLM responses.
//! - [`SessionLog`]: append-only per-session message history.
//!
//! [`SqliteStorage`] implements both.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::agent::message::{ChatMessage, Role};
use crate::error::StorageError;

/// Content-addressed response store.
///
/// Entries are never evicted. Writing an existing key replaces its value
/// in a single statement; readers never observe a partial write.
pub trait CacheStore: Send + Sync {
    /// Returns the stored text for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the entry cannot be read. Callers treat
    /// this as a miss.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Append-only session history.
pub trait SessionLog: Send + Sync {
    /// Appends one message to the end of a session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn append(&self, session_id: &str, role: Role, content: &str) -> Result<(), StorageError>;

    /// Loads a session's messages in the order they were appended.
    ///
    /// Unknown sessions yield an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the history cannot be read.
    fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>, StorageError>;
}
