//! Statistics API endpoints.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::history::{
    activity_stats, query_window, stock_report, ActivityStats, HistoryFilter, StockReport,
};
use crate::models::{from_doc, Consumable};
use crate::store::collections;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParams {
    #[serde(default = "default_days_back")]
    pub days_back: u32,
}

fn default_days_back() -> u32 {
    30
}

/// GET /api/stats/activity - Action counts and most-active staff over a window.
pub async fn activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<ActivityStats> {
    let (start, end) = query_window(params.days_back)?;
    let entries = state
        .history
        .query_range(start, end, &HistoryFilter::default(), None)
        .await?;
    success(activity_stats(&entries))
}

/// GET /api/stats/stock - Low/out-of-stock consumables against thresholds.
pub async fn stock(State(state): State<AppState>) -> ApiResult<StockReport> {
    let docs = state
        .store
        .list_all(collections::CONSUMABLES)
        .await
        .map_err(AppError::from)?;
    let consumables = docs
        .iter()
        .map(from_doc)
        .collect::<Result<Vec<Consumable>, _>>()?;
    success(stock_report(&consumables))
}
