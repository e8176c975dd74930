//! Staff API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{success, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{from_doc, to_fields, CreateStaffRequest, Staff};
use crate::store::collections;
use crate::AppState;

/// POST /api/staff - Register a new staff member (admin).
pub async fn create_staff(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<Staff> {
    actor.require_admin()?;

    if request.job_code.trim().is_empty() {
        return Err(AppError::Validation("jobCode is required".to_string()));
    }
    if request.display_name.trim().is_empty() {
        return Err(AppError::Validation("displayName is required".to_string()));
    }
    if state
        .cache
        .staff_internal_id(&request.job_code)
        .await?
        .is_some()
    {
        return Err(AppError::Validation(format!(
            "Staff {} already exists",
            request.job_code
        )));
    }

    let staff = Staff {
        job_code: request.job_code.clone(),
        display_name: request.display_name.clone(),
        role: request.role,
        active: request.active,
        assigned_tool_ids: Vec::new(),
    };
    let internal_id = Uuid::new_v4().to_string();
    state
        .store
        .set_merge(collections::STAFF, &internal_id, to_fields(&staff)?)
        .await
        .map_err(AppError::from)?;

    success(staff)
}

/// GET /api/staff/{jobCode} - Fetch a staff member by job code.
pub async fn get_staff(
    State(state): State<AppState>,
    Path(job_code): Path<String>,
) -> ApiResult<Staff> {
    let internal_id = state
        .cache
        .staff_internal_id(&job_code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", job_code)))?;
    let doc = state
        .store
        .get(collections::STAFF, &internal_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", job_code)))?;
    success(from_doc(&doc)?)
}
