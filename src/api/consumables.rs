//! Consumable API endpoints.

use axum::{extract::State, Json};
use uuid::Uuid;

use super::{success, ApiResult};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::{from_doc, to_fields, Consumable, CreateConsumableRequest};
use crate::store::collections;
use crate::AppState;

/// POST /api/consumables - Register a consumable stock line (admin).
pub async fn create_consumable(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateConsumableRequest>,
) -> ApiResult<Consumable> {
    actor.require_admin()?;

    if request.consumable_id.trim().is_empty() {
        return Err(AppError::Validation("consumableId is required".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let consumable = Consumable {
        consumable_id: request.consumable_id.clone(),
        name: request.name.clone(),
        quantity: request.quantity,
        min_stock: request.min_stock,
        max_stock: request.max_stock,
    };
    let internal_id = Uuid::new_v4().to_string();
    state
        .store
        .set_merge(
            collections::CONSUMABLES,
            &internal_id,
            to_fields(&consumable)?,
        )
        .await
        .map_err(AppError::from)?;

    success(consumable)
}

/// GET /api/consumables - List all consumables.
pub async fn list_consumables(State(state): State<AppState>) -> ApiResult<Vec<Consumable>> {
    let docs = state
        .store
        .list_all(collections::CONSUMABLES)
        .await
        .map_err(AppError::from)?;
    let consumables = docs
        .iter()
        .map(from_doc)
        .collect::<Result<Vec<Consumable>, _>>()?;
    success(consumables)
}
