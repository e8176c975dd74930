//! SQLite-backed document store.
//!
//! Documents live in one generic table keyed by (collection, id) with the
//! payload as a JSON column. Equality queries use `json_extract`; the atomic
//! transaction primitive is a version-checked read-merge-write inside a
//! single SQL transaction.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{merge_fields, Document, DocumentStore, StoreError, TxnWrite};

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite document store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, data, version, updated_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError> {
        let limit = limit.unwrap_or(u32::MAX) as i64;
        let rows = sqlx::query(
            "SELECT id, data, version, updated_at FROM documents \
             WHERE collection = ? AND json_extract(data, ?) = ? LIMIT ?",
        )
        .bind(collection)
        .bind(format!("$.{}", field))
        .bind(value)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, data, version, updated_at FROM documents WHERE collection = ? ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
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
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for write in &writes {
            let row = sqlx::query(
                "SELECT data, version FROM documents WHERE collection = ? AND id = ?",
            )
            .bind(&write.collection)
            .bind(&write.id)
            .fetch_optional(&mut *tx)
            .await?;

            let current_version = row.as_ref().map(|r| r.get::<i64, _>("version")).unwrap_or(0);
            if let Some(expected) = write.expected_version {
                if current_version != expected {
                    // Dropping the transaction rolls everything back.
                    return Err(StoreError::Conflict);
                }
            }

            let mut data = match &row {
                Some(r) => parse_payload(&r.get::<String, _>("data"))?,
                None => Map::new(),
            };
            merge_fields(&mut data, &write.fields);
            let payload = Value::Object(data).to_string();

            if row.is_some() {
                // Conditional on the version read above so a concurrent
                // writer between our read and this update loses cleanly.
                let result = sqlx::query(
                    "UPDATE documents SET data = ?, version = ?, updated_at = ? \
                     WHERE collection = ? AND id = ? AND version = ?",
                )
                .bind(&payload)
                .bind(current_version + 1)
                .bind(&now)
                .bind(&write.collection)
                .bind(&write.id)
                .bind(current_version)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict);
                }
            } else {
                sqlx::query(
                    "INSERT INTO documents (collection, id, data, version, updated_at) \
                     VALUES (?, ?, ?, 1, ?)",
                )
                .bind(&write.collection)
                .bind(&write.id)
                .bind(&payload)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn document_from_row(row: &SqliteRow) -> Result<Document, StoreError> {
    let payload: String = row.get("data");
    Ok(Document {
        id: row.get("id"),
        version: row.get("version"),
        updated_at: row.get("updated_at"),
        data: parse_payload(&payload)?,
    })
}

fn parse_payload(payload: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Backend(
            "document payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(StoreError::Backend(format!("corrupt document payload: {}", e))),
    }
}
