//! Session persistence
//!
//! The store is the only cross-request shared mutable resource. Access is
//! read-modify-write scoped to one user's key; there is no locking across the
//! read and the write, so concurrent writers for the same user resolve as
//! last-writer-wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::core::UserId;
use crate::domain::Session;

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load a session; `None` when absent or expired
    async fn get(&self, user_id: UserId) -> Result<Option<Session>>;

    /// Replace a session
    async fn set(&self, session: &Session) -> Result<()>;

    /// Remove a session
    async fn clear(&self, user_id: UserId) -> Result<()>;

    /// Flush and release resources
    async fn close(&self) -> Result<()>;
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// SQLite-backed session store with a time-to-live policy
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Mutex<Option<Connection>>,
    ttl: Duration,
}

impl SqliteSessionStore {
    /// Open or create the session database
    pub fn open(path: &Path, ttl: Duration) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        Self::with_connection(conn, ttl)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory(ttl: Duration) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, ttl)
    }

    fn with_connection(conn: Connection, ttl: Duration) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                user_id    INTEGER PRIMARY KEY,
                data       TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            ttl,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        let conn = guard.as_ref().ok_or_else(|| anyhow!("session store closed"))?;
        f(conn)
    }

    fn cutoff(&self) -> i64 {
        unix_now() - self.ttl.as_secs() as i64
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, user_id: UserId) -> Result<Option<Session>> {
        let cutoff = self.cutoff();
        let data: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT data FROM sessions WHERE user_id = ?1 AND updated_at >= ?2",
                    params![user_id, cutoff],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        let Some(data) = data else {
            return Ok(None);
        };
        match serde_json::from_str(&data) {
            Ok(session) => Ok(Some(session)),
            // Written by an incompatible build; start over rather than lock the user out
            Err(err) => {
                warn!(user_id, error = %err, "undecodable session dropped");
                self.clear(user_id).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string(session)?;
        let now = unix_now();
        let cutoff = self.cutoff();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions(user_id, data, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET data=excluded.data, updated_at=excluded.updated_at",
                params![session.user_id, data, now],
            )?;
            conn.execute(
                "DELETE FROM sessions WHERE updated_at < ?1",
                params![cutoff],
            )?;
            Ok(())
        })
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| err)?;
        }
        Ok(())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: UserId) -> Result<Option<Session>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        Ok(sessions.get(&user_id).cloned())
    }

    async fn set(&self, session: &Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        sessions.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        sessions.remove(&user_id);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
