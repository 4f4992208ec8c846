// SQLite-backed document store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{Document, DocumentStore, StoreError};

/// Documents live in one table keyed by `(collection, key)`, with the body
/// stored as JSON text.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| open_error("open", path, e))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| open_error("configure", path, e))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key        TEXT NOT NULL,
                body       TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (collection, key)
            );
            ",
        )
        .map_err(|e| open_error("create schema for", path, e))?;

        debug!("document store opened at {path}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

fn open_error(operation: &'static str, path: &str, source: rusqlite::Error) -> StoreError {
    StoreError::Open {
        operation,
        path: path.to_string(),
        source,
    }
}

fn sqlite_error(
    operation: &'static str,
    collection: &str,
    key: &str,
) -> impl FnOnce(rusqlite::Error) -> StoreError {
    let collection = collection.to_string();
    let key = key.to_string();
    move |source| StoreError::Sqlite {
        operation,
        collection,
        key,
        source,
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND key = ?2)",
            params![collection, key],
            |row| row.get(0),
        )
        .map_err(sqlite_error("exists", collection, key))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let body: Option<String> = {
            let conn = self.conn();
            conn.query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error("get", collection, key))?
        };

        body.map(|text| {
            serde_json::from_str::<Document>(&text).map_err(|source| StoreError::Corrupt {
                collection: collection.to_string(),
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    /// Writes a document in one statement. With `merge`, the stored body is
    /// combined with the payload through SQLite's `json_patch`, so the
    /// payload's fields win and every other stored field survives.
    async fn set(
        &self,
        collection: &str,
        key: &str,
        payload: &Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(payload).map_err(|source| StoreError::Corrupt {
            collection: collection.to_string(),
            key: key.to_string(),
            source,
        })?;

        let sql = if merge {
            "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE SET
                body       = json_patch(documents.body, excluded.body),
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"
        } else {
            "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE SET
                body       = excluded.body,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"
        };

        let conn = self.conn();
        conn.execute(sql, params![collection, key, body])
            .map_err(sqlite_error("set", collection, key))?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(sqlite_error("count", collection, "*"))?;
        Ok(count as usize)
    }

    async fn list_keys(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT key FROM documents WHERE collection = ?1 ORDER BY key")
            .map_err(sqlite_error("list_keys", collection, "*"))?;
        let keys = stmt
            .query_map(params![collection], |row| row.get(0))
            .map_err(sqlite_error("list_keys", collection, "*"))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(sqlite_error("list_keys", collection, "*"))?;
        Ok(keys)
    }
}
