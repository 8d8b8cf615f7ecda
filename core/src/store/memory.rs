//! In-memory backend.
//!
//! Uses DashMap for concurrent access. Suitable for development and testing; nothing
//! survives the process.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::trace;

use super::{CollectionInfo, StoredEntry, VectorBackend};
use crate::Result;

#[derive(Default)]
pub struct InMemoryBackend {
    collections: DashMap<String, CollectionInfo>,
    /// collection -> (id -> entry)
    records: DashMap<String, DashMap<String, StoredEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        let info = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                trace!(target: "vector_store", collection = name, "Creating collection");
                CollectionInfo {
                    name: name.to_string(),
                    created_at: Utc::now(),
                }
            })
            .clone();
        Ok(info)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut all: Vec<CollectionInfo> =
            self.collections.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.contains_key(name))
    }

    async fn put(&self, collection: &str, entry: StoredEntry) -> Result<()> {
        self.records
            .entry(collection.to_string())
            .or_default()
            .insert(entry.record.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>> {
        Ok(self
            .records
            .get(collection)
            .and_then(|c| c.get(id).map(|e| e.value().clone())))
    }

    async fn scan(&self, collection: &str) -> Result<Vec<StoredEntry>> {
        Ok(self
            .records
            .get(collection)
            .map(|c| c.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(c) = self.records.get(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.records.get(collection).map(|c| c.len()).unwrap_or(0))
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
