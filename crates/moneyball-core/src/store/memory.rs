// In-process document store for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Document, DocumentStore, StoreError};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Documents held in memory. Every operation runs under one lock, so `set`
/// with `merge` is atomic per call.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collections(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .collections()
            .get(collection)
            .is_some_and(|docs| docs.contains_key(key)))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        payload: &Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(key) {
            Some(existing) if merge => {
                for (field, value) in payload {
                    existing.insert(field.clone(), value.clone());
                }
            }
            _ => {
                docs.insert(key.to_string(), payload.clone());
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.collections().get(collection).map_or(0, BTreeMap::len))
    }

    async fn list_keys(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .collections()
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }
}
