//! History API endpoints.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::models::LedgerEntry;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_days_back() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/history/tool/{toolId} - History of one tool, newest first.
pub async fn tool_history(
    State(state): State<AppState>,
    Path(tool_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state
        .history
        .tool_history(&tool_id, params.days_back, params.limit)
        .await?;
    success(entries)
}

/// GET /api/history/staff/{jobCode} - History of one staff member, newest first.
pub async fn staff_history(
    State(state): State<AppState>,
    Path(job_code): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state
        .history
        .staff_history(&job_code, params.days_back, params.limit)
        .await?;
    success(entries)
}

/// GET /api/history/today - All transactions of the current day.
pub async fn today_transactions(
    State(state): State<AppState>,
    Query(params): Query<TodayParams>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state.history.today(params.limit).await?;
    success(entries)
}
