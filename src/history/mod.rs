//! History query engine.
//!
//! Reconstructs flat, time-ordered transaction lists by iterating bucket keys
//! across a date range, merging bucket documents, and filtering/sorting in
//! memory. Read cost is bounded by the calendar span of the range, not by
//! transaction volume.

mod stats;

pub use stats::{activity_stats, stock_report, ActivityStats, StaffActivity, StockReport};

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use crate::cache::IdCache;
use crate::errors::AppError;
use crate::models::{global_bucket_id, tool_bucket_id, LedgerEntry, TxnAction};
use crate::store::{collections, Document, DocumentStore};

/// Longest queryable window in days. Bucket reads scale with the calendar
/// span, so an unbounded `daysBack` would turn one request into millions of
/// point gets (and overflow the date arithmetic well before that).
pub const MAX_DAYS_BACK: u32 = 3650;

/// Validate a days-back window and return its `[start, end]` dates.
pub fn query_window(days_back: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    if days_back > MAX_DAYS_BACK {
        return Err(AppError::Validation(format!(
            "daysBack must be at most {}",
            MAX_DAYS_BACK
        )));
    }
    let end = Utc::now().date_naive();
    Ok((end - Duration::days(days_back as i64), end))
}

/// Optional equality filters applied to each entry.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub tool_ref: Option<String>,
    pub staff_ref: Option<String>,
    pub action: Option<TxnAction>,
}

pub struct HistoryEngine {
    store: Arc<dyn DocumentStore>,
    cache: Arc<IdCache>,
}

impl HistoryEngine {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<IdCache>) -> Self {
        Self { store, cache }
    }

    /// Flat entry list for [start, end] from the global day buckets,
    /// newest first, truncated to `limit`.
    pub async fn query_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: &HistoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let mut entries = Vec::new();
        let mut day = start;
        while day <= end {
            if let Some(doc) = self
                .store
                .get(collections::TRANSACTIONS, &global_bucket_id(day))
                .await?
            {
                collect_entries(&doc, &mut entries);
            }
            day += Duration::days(1);
        }
        Ok(finish(entries, start, end, filter, limit))
    }

    /// History of one tool from its per-tool month buckets.
    pub async fn tool_history(
        &self,
        tool_id: &str,
        days_back: u32,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let (start, end) = query_window(days_back)?;
        let tool_ref = self
            .cache
            .tool_internal_id(tool_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;

        let mut entries = Vec::new();
        let mut seen_bucket = String::new();
        let mut day = start;
        while day <= end {
            let bucket = tool_bucket_id(&tool_ref, day);
            if bucket != seen_bucket {
                if let Some(doc) = self.store.get(collections::TOOL_HISTORY, &bucket).await? {
                    collect_entries(&doc, &mut entries);
                }
                seen_bucket = bucket;
            }
            day += Duration::days(1);
        }

        let filter = HistoryFilter {
            tool_ref: Some(tool_ref),
            ..Default::default()
        };
        Ok(finish(entries, start, end, &filter, limit))
    }

    /// History of one staff member from the global buckets.
    pub async fn staff_history(
        &self,
        job_code: &str,
        days_back: u32,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let (start, end) = query_window(days_back)?;
        let staff_ref = self
            .cache
            .staff_internal_id(job_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", job_code)))?;

        let filter = HistoryFilter {
            staff_ref: Some(staff_ref),
            ..Default::default()
        };
        self.query_range(start, end, &filter, limit).await
    }

    /// All transactions of the current day.
    pub async fn today(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>, AppError> {
        let today = Utc::now().date_naive();
        self.query_range(today, today, &HistoryFilter::default(), limit)
            .await
    }
}

fn collect_entries(doc: &Document, out: &mut Vec<LedgerEntry>) {
    let Some(values) = doc.data.get("entries").and_then(Value::as_array) else {
        return;
    };
    for value in values {
        match serde_json::from_value::<LedgerEntry>(value.clone()) {
            Ok(entry) => out.push(entry),
            Err(e) => {
                tracing::warn!("Skipping corrupt ledger entry in bucket {}: {}", doc.id, e);
            }
        }
    }
}

/// Bound to [start, end], apply equality filters, sort newest first, truncate.
fn finish(
    entries: Vec<LedgerEntry>,
    start: NaiveDate,
    end: NaiveDate,
    filter: &HistoryFilter,
    limit: Option<usize>,
) -> Vec<LedgerEntry> {
    let mut out: Vec<LedgerEntry> = entries
        .into_iter()
        .filter(|e| {
            let date = e.timestamp.date_naive();
            date >= start && date <= end
        })
        .filter(|e| match &filter.tool_ref {
            Some(tool_ref) => e.tool_ref == *tool_ref,
            None => true,
        })
        .filter(|e| match &filter.staff_ref {
            Some(staff_ref) => e.staff_ref.as_deref() == Some(staff_ref.as_str()),
            None => true,
        })
        .filter(|e| match filter.action {
            Some(action) => e.action == action,
            None => true,
        })
        .collect();

    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}
