//! Tool descriptors persisted in their own collection and retrieved by similarity.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::registry::ToolRegistry;
use super::traits::ToolDescriptor;
use crate::store::{Metadata, VectorStore, TOOL_COLLECTION};
use crate::Result;

pub struct ToolCatalog {
    store: VectorStore,
}

impl ToolCatalog {
    pub fn new(store: VectorStore) -> Self {
        Self { store }
    }

    /// Persist every registered descriptor whose name is not stored yet.
    ///
    /// Returns how many descriptors were added.
    pub async fn sync(&self, registry: &ToolRegistry) -> Result<usize> {
        let collection = self.store.get_or_create_collection(TOOL_COLLECTION).await?;

        let known: HashSet<String> = self
            .store
            .list(TOOL_COLLECTION)
            .await?
            .into_iter()
            .filter_map(|r| r.metadata.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect();

        let mut added = 0;
        for descriptor in registry.descriptors() {
            if known.contains(&descriptor.name) {
                continue;
            }
            let mut metadata = Metadata::new();
            metadata.insert("name".into(), descriptor.name.clone().into());
            metadata.insert("source".into(), "tool_registry".into());
            collection
                .insert(&serde_json::to_string(&descriptor)?, metadata)
                .await?;
            debug!(target: "tool_registry", tool = %descriptor.name, "Persisted tool descriptor");
            added += 1;
        }
        Ok(added)
    }

    /// Up to `k` stored descriptors most similar to `task`
    pub async fn relevant(&self, task: &str, k: usize) -> Result<Vec<ToolDescriptor>> {
        let hits = self.store.query(TOOL_COLLECTION, task, k).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match serde_json::from_str(&hit.record.content) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!(target: "tool_registry", id = %hit.record.id, error = %e, "Skipping unreadable tool descriptor");
                    None
                }
            })
            .collect())
    }
}
