//! Persistent RocksDB backend.
//!
//! Column families:
//! - `collections`: collection name -> `CollectionInfo`
//! - `records`: `<collection>\0<id>` -> `StoredEntry` (record + embedding)
//!
//! Values are JSON. A collection scan is a prefix iteration over `records`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use super::{storage_unavailable, storage_write, CollectionInfo, StoredEntry, VectorBackend};
use crate::{FusionError, Result};

const CF_COLLECTIONS: &str = "collections";
const CF_RECORDS: &str = "records";

pub struct RocksDbBackend {
    db: DB,
}

impl RocksDbBackend {
    /// Open (creating if missing) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            FusionError::StoreUnavailable(format!("cannot create {}: {e}", path.display()))
        })?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_COLLECTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_RECORDS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(storage_unavailable)?;

        info!(target: "vector_store", path = %path.display(), "RocksDB vector store opened");
        Ok(Arc::new(Self { db }))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| FusionError::StoreUnavailable(format!("Missing CF: {}", name)))
    }

    fn record_prefix(collection: &str) -> Vec<u8> {
        let mut key = collection.as_bytes().to_vec();
        key.push(0);
        key
    }

    fn record_key(collection: &str, id: &str) -> Vec<u8> {
        let mut key = Self::record_prefix(collection);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn read_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let cf = self.cf(CF_COLLECTIONS)?;
        match self.db.get_cf(&cf, name) {
            Ok(Some(data)) => Ok(Some(serde_json::from_slice(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_unavailable(e)),
        }
    }
}

#[async_trait]
impl VectorBackend for RocksDbBackend {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionInfo> {
        if let Some(info) = self.read_collection(name)? {
            return Ok(info);
        }

        let info = CollectionInfo {
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let cf = self.cf(CF_COLLECTIONS)?;
        self.db
            .put_cf(&cf, name, serde_json::to_vec(&info)?)
            .map_err(storage_write)?;

        debug!(target: "vector_store", collection = name, "Created collection");
        Ok(info)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let cf = self.cf(CF_COLLECTIONS)?;
        let mut all = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(storage_unavailable)?;
            all.push(serde_json::from_slice(&value)?);
        }
        Ok(all)
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.read_collection(name)?.is_some())
    }

    async fn put(&self, collection: &str, entry: StoredEntry) -> Result<()> {
        let cf = self.cf(CF_RECORDS)?;
        let key = Self::record_key(collection, &entry.record.id);
        self.db
            .put_cf(&cf, key, serde_json::to_vec(&entry)?)
            .map_err(storage_write)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>> {
        let cf = self.cf(CF_RECORDS)?;
        match self.db.get_cf(&cf, Self::record_key(collection, id)) {
            Ok(Some(data)) => Ok(Some(serde_json::from_slice(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_unavailable(e)),
        }
    }

    async fn scan(&self, collection: &str) -> Result<Vec<StoredEntry>> {
        let cf = self.cf(CF_RECORDS)?;
        let prefix = Self::record_prefix(collection);
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(storage_unavailable)?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let cf = self.cf(CF_RECORDS)?;
        self.db
            .delete_cf(&cf, Self::record_key(collection, id))
            .map_err(storage_write)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let cf = self.cf(CF_RECORDS)?;
        let prefix = Self::record_prefix(collection);
        let mut n = 0;
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(storage_unavailable)?;
            if !key.starts_with(&prefix) {
                break;
            }
            n += 1;
        }
        Ok(n)
    }

    async fn flush(&self) -> Result<()> {
        for name in [CF_COLLECTIONS, CF_RECORDS] {
            let cf = self.cf(name)?;
            self.db.flush_cf(&cf).map_err(storage_write)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HashingEmbedder, VectorStore};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prefix_scan_is_scoped_to_collection() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(
            RocksDbBackend::open(dir.path()).unwrap(),
            Arc::new(HashingEmbedder::new(32)),
        );

        store.insert("a", "alpha", Default::default()).await.unwrap();
        store.insert("ab", "alpha beta", Default::default()).await.unwrap();
        store.insert("ab", "gamma", Default::default()).await.unwrap();

        assert_eq!(store.count("a").await.unwrap(), 1);
        assert_eq!(store.count("ab").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_unavailable() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();

        let err = RocksDbBackend::open(file.join("db")).err().unwrap();
        assert!(matches!(err, FusionError::StoreUnavailable(_)));
    }
}
