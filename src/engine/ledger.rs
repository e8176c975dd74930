//! Best-effort ledger persistence.
//!
//! After the primary state transition commits, every entry is appended to two
//! denormalized representations: the per-tool month bucket and the global day
//! bucket. Appends that fail are logged and swallowed; the committed state
//! transition is authoritative and is never rolled back for a history write.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::models::{date_key, day_key, global_bucket_id, month_key, tool_bucket_id, LedgerEntry};
use crate::store::{collections, DocumentStore, StoreError, TxnWrite};

/// Bucket appends are read-modify-write over the entry array, so a conflicting
/// writer to the same bucket is retried a few times before giving up.
const MAX_APPEND_RETRIES: u32 = 5;

pub struct LedgerWriter {
    store: Arc<dyn DocumentStore>,
}

impl LedgerWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append `entry` to both bucket representations, best-effort.
    pub async fn record(&self, entry: &LedgerEntry) {
        let date = entry.timestamp.date_naive();

        let tool_bucket = tool_bucket_id(&entry.tool_ref, date);
        if let Err(e) = self
            .append(collections::TOOL_HISTORY, &tool_bucket, entry)
            .await
        {
            tracing::warn!(
                "Failed to append entry {} to tool bucket {}: {}",
                entry.id,
                tool_bucket,
                e
            );
        }

        let day_bucket = global_bucket_id(date);
        if let Err(e) = self
            .append(collections::TRANSACTIONS, &day_bucket, entry)
            .await
        {
            tracing::warn!(
                "Failed to append entry {} to day bucket {}: {}",
                entry.id,
                day_bucket,
                e
            );
        }
    }

    async fn append(
        &self,
        collection: &str,
        bucket_id: &str,
        entry: &LedgerEntry,
    ) -> Result<(), StoreError> {
        let entry_value = serde_json::to_value(entry)
            .map_err(|e| StoreError::Backend(format!("serialize entry: {}", e)))?;
        let date = entry.timestamp.date_naive();

        for _ in 0..MAX_APPEND_RETRIES {
            let (expected, mut entries) = match self.store.get(collection, bucket_id).await? {
                Some(doc) => (
                    doc.version,
                    doc.data
                        .get("entries")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default(),
                ),
                None => (0, Vec::new()),
            };
            entries.push(entry_value.clone());

            let mut fields = Map::new();
            fields.insert("entries".to_string(), Value::Array(entries));
            fields.insert("monthKey".to_string(), Value::String(month_key(date)));
            // Day-granularity keys only exist on the global day bucket; the
            // per-tool bucket spans a whole month.
            if collection == collections::TRANSACTIONS {
                fields.insert("dayKey".to_string(), Value::String(day_key(date)));
                fields.insert("date".to_string(), Value::String(date_key(date)));
            }

            let write = TxnWrite::new(collection, bucket_id, fields).expecting(expected);
            match self.store.run_transaction(vec![write]).await {
                Ok(()) => return Ok(()),
                // Another append landed between our read and write; re-read.
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict)
    }
}
