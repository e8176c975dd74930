//! In-memory document store.
//!
//! Used by unit tests for isolation from SQLite and for asserting how many
//! store operations a code path issues (the identifier cache tests rely on
//! the counters). Version conflicts can be injected to exercise the losing
//! side of a write race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use super::{merge_fields, Document, DocumentStore, StoreError, TxnWrite};

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(String, String), Document>>,
    gets: AtomicU64,
    queries: AtomicU64,
    txn_conflicts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of point lookups issued so far.
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of equality queries issued so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make the next `n` transactions fail with a version conflict, as if a
    /// concurrent writer had won each race.
    pub fn fail_next_transactions(&self, n: u64) {
        self.txn_conflicts.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.lock().unwrap();
        Ok(docs.get(&(collection.to_string(), id.to_string())).cloned())
    }

    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.lock().unwrap();
        let mut out: Vec<Document> = docs
            .iter()
            .filter(|((col, _), doc)| {
                col == collection && doc.data.get(field).and_then(Value::as_str) == Some(value)
            })
            .map(|(_, doc)| doc.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.lock().unwrap();
        let mut out: Vec<Document> = docs
            .iter()
            .filter(|((col, _), _)| col == collection)
            .map(|(_, doc)| doc.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.run_transaction(vec![TxnWrite::new(collection, id, fields)])
            .await
    }

    async fn run_transaction(&self, writes: Vec<TxnWrite>) -> Result<(), StoreError> {
        if self
            .txn_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict);
        }

        let mut docs = self.docs.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        // Validate every precondition before mutating anything.
        for write in &writes {
            let key = (write.collection.clone(), write.id.clone());
            let current_version = docs.get(&key).map(|d| d.version).unwrap_or(0);
            if let Some(expected) = write.expected_version {
                if current_version != expected {
                    return Err(StoreError::Conflict);
                }
            }
        }

        for write in writes {
            let key = (write.collection.clone(), write.id.clone());
            let doc = docs.entry(key).or_insert_with(|| Document {
                id: write.id.clone(),
                version: 0,
                updated_at: now.clone(),
                data: Map::new(),
            });
            merge_fields(&mut doc.data, &write.fields);
            doc.version += 1;
            doc.updated_at = now.clone();
        }
        Ok(())
    }
}
