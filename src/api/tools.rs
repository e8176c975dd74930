//! Tool API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{success, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{to_fields, CreateToolRequest, Tool, ToolStatus, ToolStatusInfo};
use crate::store::collections;
use crate::AppState;

/// POST /api/tools - Register a new tool (admin).
pub async fn create_tool(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateToolRequest>,
) -> ApiResult<Tool> {
    actor.require_admin()?;

    if request.tool_id.trim().is_empty() {
        return Err(AppError::Validation("toolId is required".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if state.cache.tool_internal_id(&request.tool_id).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Tool {} already exists",
            request.tool_id
        )));
    }

    let tool = Tool {
        tool_id: request.tool_id.clone(),
        name: request.name.clone(),
        brand: request.brand.clone(),
        model: request.model.clone(),
        status: ToolStatus::Available,
        current_holder: None,
        last_assigned_to: None,
        last_assigned_by: None,
        last_assigned_at: None,
        last_checkin_by: None,
        last_checkin_at: None,
    };
    let internal_id = Uuid::new_v4().to_string();
    state
        .store
        .set_merge(collections::TOOLS, &internal_id, to_fields(&tool)?)
        .await
        .map_err(AppError::from)?;

    success(tool)
}

/// GET /api/tools/{toolId}/status - Status view for the scanning screens.
pub async fn tool_status(
    State(state): State<AppState>,
    Path(tool_id): Path<String>,
) -> ApiResult<ToolStatusInfo> {
    let info = state.engine.tool_status_info(&tool_id).await?;
    success(info)
}
