//! Document store abstraction.
//!
//! The engine talks to a generic document store: durable JSON documents keyed
//! by (collection, id), server-assigned timestamps, equality queries, and
//! atomic version-conditioned multi-document transactions. Two backends exist:
//! SQLite for production and an in-memory fake for tests.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{init_database, SqliteStore};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Collection names used by the application.
pub mod collections {
    pub const TOOLS: &str = "tools";
    pub const STAFF: &str = "staff";
    pub const CONSUMABLES: &str = "consumables";
    /// Per-tool history buckets, doc id `{toolRef}/{MM-YYYY}`.
    pub const TOOL_HISTORY: &str = "toolHistory";
    /// Global day buckets, doc id `{MM-YYYY}/{DD}`.
    pub const TRANSACTIONS: &str = "transactions";
}

/// Store-level error type.
#[derive(Debug)]
pub enum StoreError {
    /// A version-conditioned write observed a different version than expected.
    Conflict,
    /// Backend failure (I/O, corrupt payload, ...).
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "conflicting write detected"),
            StoreError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(format!("database error: {}", err))
    }
}

/// A stored document: JSON field map plus store-maintained metadata.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Monotonic per-document version, starting at 1. A missing document is
    /// conceptually at version 0.
    pub version: i64,
    /// Server-assigned RFC3339 timestamp of the last write.
    pub updated_at: String,
    pub data: Map<String, Value>,
}

/// One merge-write inside an atomic transaction.
///
/// `expected_version` semantics: `None` applies unconditionally (plain
/// set-merge), `Some(0)` requires the document to not exist yet, `Some(n)`
/// requires the current version to be exactly `n`.
#[derive(Debug, Clone)]
pub struct TxnWrite {
    pub collection: String,
    pub id: String,
    pub expected_version: Option<i64>,
    pub fields: Map<String, Value>,
}

impl TxnWrite {
    pub fn new(collection: &str, id: &str, fields: Map<String, Value>) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            expected_version: None,
            fields,
        }
    }

    pub fn expecting(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Abstract document store consumed by the cache, engine, and history modules.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by document id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Equality query on a top-level string field.
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fetch every document in a collection.
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Create-or-update, merging `fields` into the existing payload.
    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Apply all writes atomically. Fails with [`StoreError::Conflict`]
    /// (touching nothing) if any version precondition does not hold.
    async fn run_transaction(&self, writes: Vec<TxnWrite>) -> Result<(), StoreError>;
}

/// Merge `fields` into `data`, replacing existing keys.
pub(crate) fn merge_fields(data: &mut Map<String, Value>, fields: &Map<String, Value>) {
    for (key, value) in fields {
        data.insert(key.clone(), value.clone());
    }
}
