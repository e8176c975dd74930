//! Ledger entry model and bucket key derivation.
//!
//! Every checkout/checkin event is recorded twice: in a per-tool bucket keyed
//! by month and in a global bucket keyed by month then day. The key formats
//! are load-bearing for existing data and must not change:
//! month key `MM-YYYY`, day key `DD`, date string `YYYY-MM-DD`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnAction {
    Checkout,
    Checkin,
}

/// One immutable checkout/checkin event. Denormalized display metadata is
/// captured at write time so history views never need secondary lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Time-based synthetic id; unique in practice, not by contract.
    pub id: String,
    pub action: TxnAction,
    /// Internal document id of the tool.
    pub tool_ref: String,
    /// Readable tool id.
    pub tool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Request body for a single check-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    pub tool_id: String,
    pub job_code: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for a single check-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub tool_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for a batch check-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckOutRequest {
    pub tool_ids: Vec<String>,
    pub job_code: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for a batch check-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckInRequest {
    pub tool_ids: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Per-item outcome of a batch operation. A batch is not atomic as a whole;
/// partial success is expected and reported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub batch_id: String,
    /// Readable tool id -> success flag.
    pub results: std::collections::BTreeMap<String, bool>,
    pub succeeded: usize,
    pub failed: usize,
    /// Per-item error strings for display.
    pub errors: Vec<String>,
}

/// Generate a time-based entry id.
pub fn entry_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.timestamp_millis(), &suffix[..8])
}

/// Generate a batch correlation id shared by every item of a batch.
pub fn batch_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("batch-{}-{}", at.timestamp_millis(), &suffix[..8])
}

/// Month bucket key: zero-padded month, four-digit year, e.g. `"10-2025"`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:02}-{}", date.month(), date.year())
}

/// Day key within a month bucket: zero-padded two digits, e.g. `"20"`.
pub fn day_key(date: NaiveDate) -> String {
    format!("{:02}", date.day())
}

/// Full date string, e.g. `"2025-10-20"`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Document id of the global day bucket holding all entries for `date`.
pub fn global_bucket_id(date: NaiveDate) -> String {
    format!("{}/{}", month_key(date), day_key(date))
}

/// Document id of the per-tool month bucket for `tool_ref` and `date`.
pub fn tool_bucket_id(tool_ref: &str, date: NaiveDate) -> String {
    format!("{}/{}", tool_ref, month_key(date))
}
