//! Identifier mapping cache.
//!
//! Translates human-readable codes (tool id on the QR label, staff job code)
//! to internal document ids and back, so a busy scanning session does not pay
//! a store query per scan. Filled lazily on miss, bulk-filled by `preload`,
//! and cleared by `invalidate` when the underlying data may have changed
//! out-of-band. Lookups that find nothing return `None`, never an error.
//!
//! The maps are read-mostly; redundant refills from concurrent misses are
//! harmless because the store stays authoritative.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::errors::AppError;
use crate::store::{collections, DocumentStore};

/// Document field holding the readable id, per collection.
const TOOL_READABLE_FIELD: &str = "toolId";
const STAFF_READABLE_FIELD: &str = "jobCode";

#[derive(Default)]
struct Maps {
    readable_to_internal: HashMap<String, String>,
    internal_to_readable: HashMap<String, String>,
}

impl Maps {
    fn insert(&mut self, readable: &str, internal: &str) {
        self.readable_to_internal
            .insert(readable.to_string(), internal.to_string());
        self.internal_to_readable
            .insert(internal.to_string(), readable.to_string());
    }
}

/// Bidirectional readable-id cache for tools and staff.
pub struct IdCache {
    store: Arc<dyn DocumentStore>,
    tools: RwLock<Maps>,
    staff: RwLock<Maps>,
}

impl IdCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            tools: RwLock::new(Maps::default()),
            staff: RwLock::new(Maps::default()),
        }
    }

    /// Resolve a readable tool id to its internal document id.
    pub async fn tool_internal_id(&self, readable: &str) -> Result<Option<String>, AppError> {
        self.forward(&self.tools, collections::TOOLS, TOOL_READABLE_FIELD, readable)
            .await
    }

    /// Resolve a staff job code to its internal document id.
    pub async fn staff_internal_id(&self, job_code: &str) -> Result<Option<String>, AppError> {
        self.forward(&self.staff, collections::STAFF, STAFF_READABLE_FIELD, job_code)
            .await
    }

    /// Resolve an internal tool id back to its readable id.
    pub async fn tool_readable_id(&self, internal: &str) -> Result<Option<String>, AppError> {
        self.reverse(&self.tools, collections::TOOLS, TOOL_READABLE_FIELD, internal)
            .await
    }

    /// Resolve an internal staff id back to its job code.
    pub async fn staff_job_code(&self, internal: &str) -> Result<Option<String>, AppError> {
        self.reverse(&self.staff, collections::STAFF, STAFF_READABLE_FIELD, internal)
            .await
    }

    /// Bulk-fetch all tools and staff and fill both directions of both maps.
    /// Intended to run once at startup. Returns (tools, staff) counts.
    pub async fn preload(&self) -> Result<(usize, usize), AppError> {
        let tool_docs = self.store.list_all(collections::TOOLS).await?;
        let staff_docs = self.store.list_all(collections::STAFF).await?;

        let mut tools = self.tools.write().unwrap();
        for doc in &tool_docs {
            if let Some(readable) = doc.data.get(TOOL_READABLE_FIELD).and_then(Value::as_str) {
                tools.insert(readable, &doc.id);
            }
        }
        drop(tools);

        let mut staff = self.staff.write().unwrap();
        for doc in &staff_docs {
            if let Some(code) = doc.data.get(STAFF_READABLE_FIELD).and_then(Value::as_str) {
                staff.insert(code, &doc.id);
            }
        }
        drop(staff);

        Ok((tool_docs.len(), staff_docs.len()))
    }

    /// Drop every cached mapping.
    pub fn invalidate(&self) {
        *self.tools.write().unwrap() = Maps::default();
        *self.staff.write().unwrap() = Maps::default();
    }

    async fn forward(
        &self,
        maps: &RwLock<Maps>,
        collection: &str,
        field: &str,
        readable: &str,
    ) -> Result<Option<String>, AppError> {
        if let Some(internal) = maps.read().unwrap().readable_to_internal.get(readable) {
            return Ok(Some(internal.clone()));
        }

        // Expected 0 or 1 match; more than one means the data is corrupt and
        // the first match wins.
        let docs = self
            .store
            .query_equal(collection, field, readable, Some(2))
            .await?;
        if docs.len() > 1 {
            tracing::warn!(
                "Duplicate readable id {:?} in {}; using first match",
                readable,
                collection
            );
        }
        let Some(doc) = docs.first() else {
            return Ok(None);
        };

        maps.write().unwrap().insert(readable, &doc.id);
        Ok(Some(doc.id.clone()))
    }

    async fn reverse(
        &self,
        maps: &RwLock<Maps>,
        collection: &str,
        field: &str,
        internal: &str,
    ) -> Result<Option<String>, AppError> {
        if let Some(readable) = maps.read().unwrap().internal_to_readable.get(internal) {
            return Ok(Some(readable.clone()));
        }

        let Some(doc) = self.store.get(collection, internal).await? else {
            return Ok(None);
        };
        let Some(readable) = doc.data.get(field).and_then(Value::as_str) else {
            return Ok(None);
        };

        maps.write().unwrap().insert(readable, internal);
        Ok(Some(readable.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::Map;

    async fn seed(store: &MemoryStore, collection: &str, id: &str, field: &str, readable: &str) {
        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(readable.to_string()));
        store.set_merge(collection, id, fields).await.unwrap();
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, collections::TOOLS, "int-1", TOOL_READABLE_FIELD, "T1234").await;
        let cache = IdCache::new(store.clone());

        assert_eq!(
            cache.tool_internal_id("T1234").await.unwrap(),
            Some("int-1".to_string())
        );
        assert_eq!(store.query_count(), 1);

        // Second resolve is served from the map.
        assert_eq!(
            cache.tool_internal_id("T1234").await.unwrap(),
            Some("int-1".to_string())
        );
        assert_eq!(store.query_count(), 1);

        // The miss also primed the reverse direction.
        assert_eq!(
            cache.tool_readable_id("int-1").await.unwrap(),
            Some("T1234".to_string())
        );
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let store = Arc::new(MemoryStore::new());
        let cache = IdCache::new(store);
        assert_eq!(cache.tool_internal_id("NOPE").await.unwrap(), None);
        assert_eq!(cache.staff_internal_id("NOPE").await.unwrap(), None);
        assert_eq!(cache.staff_job_code("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_preload_avoids_per_item_queries() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            seed(
                &store,
                collections::TOOLS,
                &format!("int-{}", i),
                TOOL_READABLE_FIELD,
                &format!("T{}", i),
            )
            .await;
        }
        seed(&store, collections::STAFF, "s-1", STAFF_READABLE_FIELD, "W001").await;

        let cache = IdCache::new(store.clone());
        let (tools, staff) = cache.preload().await.unwrap();
        assert_eq!((tools, staff), (5, 1));

        for i in 0..5 {
            assert_eq!(
                cache.tool_internal_id(&format!("T{}", i)).await.unwrap(),
                Some(format!("int-{}", i))
            );
        }
        assert_eq!(cache.staff_internal_id("W001").await.unwrap(), Some("s-1".to_string()));
        assert_eq!(cache.staff_job_code("s-1").await.unwrap(), Some("W001".to_string()));

        // Preload uses list_all, so no equality queries or point gets at all.
        assert_eq!(store.query_count(), 0);
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_clears_maps() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, collections::TOOLS, "int-1", TOOL_READABLE_FIELD, "T1").await;
        let cache = IdCache::new(store.clone());

        cache.tool_internal_id("T1").await.unwrap();
        assert_eq!(store.query_count(), 1);

        cache.invalidate();
        cache.tool_internal_id("T1").await.unwrap();
        assert_eq!(store.query_count(), 2);
    }
}
