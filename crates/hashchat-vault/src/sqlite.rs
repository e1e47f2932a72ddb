//! SQLite implementation of the key-value store.
//!
//! The primary persistent backend: sealed-key records survive process
//! restarts, so a returning client resolves channel keys without
//! recreating them. Uses rusqlite with bundled SQLite, wrapped in async
//! via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::kv::{KeyValueStore, Result};

/// Current schema version.
const CURRENT_VERSION: u32 = 1;

/// SQLite-based key-value store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::TaskFailed(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::TaskFailed(format!("spawn_blocking failed: {e}")))?
    }
}

/// Initialize or migrate the database schema.
///
/// Idempotent; safe to call on every open.
fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            match version {
                1 => {
                    tx.execute(
                        "CREATE TABLE kv_entries (
                            key TEXT PRIMARY KEY,
                            value BLOB NOT NULL,
                            updated_at INTEGER NOT NULL
                        )",
                        [],
                    )?;
                }
                other => {
                    return Err(StorageError::Migration(format!(
                        "unknown migration version: {other}"
                    )))
                }
            }
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_entries", [])?;
            Ok(())
        })
        .await
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_get_set_roundtrip() {
        let store = SqliteKvStore::open_memory().unwrap();

        assert_eq!(store.get("hashchat:kids:c1").await.unwrap(), None);
        store.set("hashchat:kids:c1", b"sealed").await.unwrap();
        assert_eq!(
            store.get("hashchat:kids:c1").await.unwrap(),
            Some(b"sealed".to_vec())
        );
    }

    #[tokio::test]
    async fn test_sqlite_upsert_replaces() {
        let store = SqliteKvStore::open_memory().unwrap();
        store.set("k", b"v1").await.unwrap();
        store.set("k", b"v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_clear() {
        let store = SqliteKvStore::open_memory().unwrap();
        store.set("a", b"1").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("k", b"kept").await.unwrap();
        }

        let reopened = SqliteKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(b"kept".to_vec()));
    }
}
