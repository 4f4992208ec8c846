// Document store abstraction: collections of JSON documents addressed by key.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored document: a flat JSON object of field name to value.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {operation} sqlite database at {path}: {source}")]
    Open {
        operation: &'static str,
        path: String,
        source: rusqlite::Error,
    },

    #[error("sqlite {operation} failed for {collection}/{key}: {source}")]
    Sqlite {
        operation: &'static str,
        collection: String,
        key: String,
        source: rusqlite::Error,
    },

    #[error("document {collection}/{key} is not a valid JSON object: {source}")]
    Corrupt {
        collection: String,
        key: String,
        source: serde_json::Error,
    },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

/// How an upsert treats a key that already holds a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertPolicy {
    /// Leave the existing document untouched.
    #[default]
    SkipIfExists,
    /// Add/update the payload's fields, keep every other existing field.
    Merge,
    /// Replace the existing document with the payload.
    AlwaysOverwrite,
}

/// Minimal document-store surface the ingestion pipeline writes through.
///
/// `set` with `merge = true` must apply per-field last-write-wins in a single
/// backend operation so that concurrent merges to the same key never lose a
/// field written by another caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    async fn set(
        &self,
        collection: &str,
        key: &str,
        payload: &Document,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Number of documents in `collection`.
    async fn count(&self, collection: &str) -> Result<usize, StoreError>;

    /// All keys in `collection`, sorted.
    async fn list_keys(&self, collection: &str) -> Result<Vec<String>, StoreError>;
}
