//! Check-out/check-in API endpoints.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::auth::Actor;
use crate::engine::TxnOptions;
use crate::errors::AppError;
use crate::models::{
    BatchCheckInRequest, BatchCheckOutRequest, BatchOutcome, CheckInRequest, CheckOutRequest,
    LedgerEntry,
};
use crate::AppState;

/// POST /api/transactions/checkout - Check a tool out to a staff member.
pub async fn check_out(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CheckOutRequest>,
) -> ApiResult<LedgerEntry> {
    if request.tool_id.trim().is_empty() {
        return Err(AppError::Validation("toolId is required".to_string()));
    }
    if request.job_code.trim().is_empty() {
        return Err(AppError::Validation("jobCode is required".to_string()));
    }

    let opts = TxnOptions {
        notes: request.notes.clone(),
        admin_name: actor.name,
        batch_id: None,
    };
    let entry = state
        .engine
        .check_out(&request.tool_id, &request.job_code, &opts)
        .await?;
    success(entry)
}

/// POST /api/transactions/checkin - Check a tool back in.
pub async fn check_in(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<LedgerEntry> {
    if request.tool_id.trim().is_empty() {
        return Err(AppError::Validation("toolId is required".to_string()));
    }

    let opts = TxnOptions {
        notes: request.notes.clone(),
        admin_name: actor.name,
        batch_id: None,
    };
    let entry = state.engine.check_in(&request.tool_id, &opts).await?;
    success(entry)
}

/// POST /api/transactions/batch-checkout - Check several tools out at once.
///
/// Always returns 200 with per-item outcomes; partial failure is data, not an
/// HTTP error.
pub async fn batch_check_out(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<BatchCheckOutRequest>,
) -> ApiResult<BatchOutcome> {
    if request.tool_ids.is_empty() {
        return Err(AppError::Validation("toolIds must not be empty".to_string()));
    }
    if request.job_code.trim().is_empty() {
        return Err(AppError::Validation("jobCode is required".to_string()));
    }

    let opts = TxnOptions {
        notes: request.notes.clone(),
        admin_name: actor.name,
        batch_id: None,
    };
    let outcome = state
        .engine
        .batch_check_out(&request.tool_ids, &request.job_code, &opts)
        .await;
    success(outcome)
}

/// POST /api/transactions/batch-checkin - Check several tools back in at once.
pub async fn batch_check_in(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<BatchCheckInRequest>,
) -> ApiResult<BatchOutcome> {
    if request.tool_ids.is_empty() {
        return Err(AppError::Validation("toolIds must not be empty".to_string()));
    }

    let opts = TxnOptions {
        notes: request.notes.clone(),
        admin_name: actor.name,
        batch_id: None,
    };
    let outcome = state.engine.batch_check_in(&request.tool_ids, &opts).await;
    success(outcome)
}
