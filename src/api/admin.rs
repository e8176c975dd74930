//! Admin maintenance endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::Actor;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReloadResult {
    pub tools: usize,
    pub staff: usize,
}

/// POST /api/admin/cache/reload - Drop and repopulate the id mapping cache.
///
/// For when tools or staff were changed out-of-band (imports, direct edits).
pub async fn reload_cache(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<CacheReloadResult> {
    actor.require_admin()?;

    state.cache.invalidate();
    let (tools, staff) = state.cache.preload().await?;
    tracing::info!("Cache reloaded: {} tools, {} staff", tools, staff);
    success(CacheReloadResult { tools, staff })
}
