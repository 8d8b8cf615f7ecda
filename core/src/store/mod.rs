//! Retrieval gateway: named collections of embedded records with nearest-neighbour query.
//!
//! `VectorStore` owns the embedding step, identifier generation and ranking. Backends
//! only persist entries:
//! - `InMemoryBackend` (DashMap) for tests and ephemeral runs
//! - `RocksDbBackend` for durable storage

mod embedding;
mod memory;
mod rocks;

pub use embedding::{
    build_embedder, Embedder, EmbeddingConfig, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder,
};
pub use memory::InMemoryBackend;
pub use rocks::RocksDbBackend;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{env_parse, env_string};
use crate::{FusionError, Result};

/// General knowledge collection
pub const DATA_COLLECTION: &str = "data_store";
/// Tool descriptor collection
pub const TOOL_COLLECTION: &str = "tool_registry";

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<u64> for MetadataValue {
    fn from(v: u64) -> Self {
        MetadataValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A unit of retrievable knowledge. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub content: String,
    /// Always carries `id` and `timestamp`
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
}

/// Record plus its embedding, as persisted by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub record: StoredRecord,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Query result; lower distance means more relevant
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub record: StoredRecord,
    pub distance: f32,
}

/// Persistence seam under [`VectorStore`].
///
/// Implementations must treat `ensure_collection` as fetch-or-create and `remove`
/// as idempotent.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo>;
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
    async fn has_collection(&self, name: &str) -> Result<bool>;
    async fn put(&self, collection: &str, entry: StoredEntry) -> Result<()>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>>;
    async fn scan(&self, collection: &str) -> Result<Vec<StoredEntry>>;
    async fn remove(&self, collection: &str, id: &str) -> Result<()>;
    async fn count(&self, collection: &str) -> Result<usize>;
    async fn flush(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    RocksDb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    /// Background flush period; 0 disables the sync task
    pub sync_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let backend = match env_string("VECTOR_DB_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            _ => StoreBackend::RocksDb,
        };
        Self {
            backend,
            path: env_string("VECTOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./vector_db")),
            sync_interval_secs: env_parse("VECTOR_DB_SYNC_SECS").unwrap_or(300),
        }
    }
}

/// Retrieval gateway over a backend and an embedder. Cheap to clone.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<dyn Embedder>) -> Self {
        Self { backend, embedder }
    }

    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), embedder)
    }

    /// Open the configured backend. An unusable directory fails here, at startup.
    pub fn open(config: &StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let backend: Arc<dyn VectorBackend> = match config.backend {
            StoreBackend::Memory => Arc::new(InMemoryBackend::new()),
            StoreBackend::RocksDb => RocksDbBackend::open(&config.path)?,
        };
        Ok(Self::new(backend, embedder))
    }

    /// Idempotent by name; handles for one name share the same records
    pub async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let info = self.backend.ensure_collection(name).await?;
        Ok(CollectionHandle {
            name: info.name,
            store: self.clone(),
        })
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.backend.list_collections().await
    }

    /// Embed and persist `content`, returning the generated id.
    ///
    /// `id` and `timestamp` are generated here, before the write, and override any
    /// caller-supplied metadata under the same keys.
    pub async fn insert(
        &self,
        collection: &str,
        content: &str,
        mut metadata: Metadata,
    ) -> Result<String> {
        self.backend.ensure_collection(collection).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        metadata.insert("id".into(), MetadataValue::Text(id.clone()));
        metadata.insert("timestamp".into(), MetadataValue::Text(timestamp.to_rfc3339()));

        let embedding = self.embedder.embed(content).await?;
        let entry = StoredEntry {
            record: StoredRecord {
                id: id.clone(),
                content: content.to_string(),
                metadata,
                timestamp,
            },
            embedding,
        };
        self.backend.put(collection, entry).await?;

        debug!(target: "vector_store", collection, id = %id, "Inserted record");
        Ok(id)
    }

    /// Up to `top_k` records by ascending cosine distance to `text`.
    ///
    /// A missing or empty collection yields an empty list.
    pub async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        if top_k == 0 || !self.backend.has_collection(collection).await? {
            return Ok(Vec::new());
        }
        let entries = self.backend.scan(collection).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;
        let mut hits: Vec<QueryHit> = entries
            .into_iter()
            .filter(|e| e.embedding.len() == query_embedding.len())
            .map(|e| QueryHit {
                distance: cosine_distance(&query_embedding, &e.embedding),
                record: e.record,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.timestamp.cmp(&b.record.timestamp))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(top_k);

        debug!(target: "vector_store", collection, hits = hits.len(), "Query complete");
        Ok(hits)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>> {
        Ok(self.backend.get(collection, id).await?.map(|e| e.record))
    }

    /// Every record of a collection, oldest first
    pub async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        let mut records: Vec<StoredRecord> = self
            .backend
            .scan(collection)
            .await?
            .into_iter()
            .map(|e| e.record)
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Idempotent; removing an absent id is not an error
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.backend.remove(collection, id).await
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.backend.count(collection).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    /// Flush the backend every `interval` until the task is aborted
    pub fn spawn_sync(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.flush().await {
                    Ok(()) => debug!(target: "vector_store", "Periodic sync complete"),
                    Err(e) => warn!(target: "vector_store", error = %e, "Periodic sync failed"),
                }
            }
        })
    }
}

/// Handle to one named collection
#[derive(Clone)]
pub struct CollectionHandle {
    name: String,
    store: VectorStore,
}

impl CollectionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub async fn insert(&self, content: &str, metadata: Metadata) -> Result<String> {
        self.store.insert(&self.name, content, metadata).await
    }

    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        self.store.query(&self.name, text, top_k).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        self.store.get(&self.name, id).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(&self.name, id).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.name).await
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .finish()
    }
}

/// `1 - cosine_similarity`, clamped to `[0, 2]`
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - dot / (na * nb)).clamp(0.0, 2.0)
}

pub(crate) fn storage_unavailable(e: impl std::fmt::Display) -> FusionError {
    FusionError::StoreUnavailable(e.to_string())
}

pub(crate) fn storage_write(e: impl std::fmt::Display) -> FusionError {
    FusionError::StoreWriteError(e.to_string())
}
