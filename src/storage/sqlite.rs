//! `SQLite` implementation of the cache and session stores.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::{CacheStore, SessionLog};
use crate::agent::message::{ChatMessage, Role};
use crate::error::StorageError;

/// Schema applied on open. Idempotent.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS llm_cache (
    key        TEXT PRIMARY KEY,
    response   TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS session_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_messages_session
    ON session_messages(session_id, id);
";

/// `SQLite`-backed store.
///
/// The connection sits behind a mutex, so one instance can be shared across
/// threads and tasks; statements from concurrent callers are serialised.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file and applies the schema.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory or database cannot be created.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory database (for tests and throwaway runs).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Number of cached responses.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on query failure.
    pub fn cache_len(&self) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM llm_cache", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Lists distinct session IDs, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on query failure.
    pub fn list_sessions(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id FROM session_messages \
             GROUP BY session_id ORDER BY MAX(id) DESC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("conn", &"<rusqlite::Connection>")
            .finish()
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl CacheStore for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT response FROM llm_cache WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO llm_cache (key, response, created_at) VALUES (?1, ?2, ?3)",
            params![key, value, unix_now()],
        )?;
        Ok(())
    }
}

impl SessionLog for SqliteStorage {
    fn append(&self, session_id: &str, role: Role, content: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_messages (session_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role.as_str(), content, unix_now()],
        )?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content FROM session_messages WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut messages = Vec::with_capacity(rows.len());
        for (role, content) in rows {
            if let Some(role) = Role::parse(&role) {
                messages.push(ChatMessage { role, content });
            } else {
                warn!(session_id, role, "skipping session message with unknown role");
            }
        }
        Ok(messages)
    }
}
