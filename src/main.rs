//! ToolCrib Backend
//!
//! REST backend for the ToolCrib tool tracking application: staff scan QR
//! codes to check tools in and out; this service owns the transactional
//! check-out/check-in ledger, the history buckets, and the readable-id cache.

mod api;
mod auth;
mod cache;
mod config;
mod engine;
mod errors;
mod history;
mod models;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::IdCache;
use config::Config;
use engine::TransactionEngine;
use history::HistoryEngine;
use store::{DocumentStore, SqliteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<IdCache>,
    pub engine: Arc<TransactionEngine>,
    pub history: Arc<HistoryEngine>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ToolCrib Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (TOOLCRIB_API_PSK). Authentication is disabled!");
    }

    // Initialize document store
    let pool = store::init_database(&config.db_path).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool));

    // Identifier mapping cache
    let cache = Arc::new(IdCache::new(store.clone()));
    if config.preload_cache {
        let (tools, staff) = cache.preload().await?;
        tracing::info!("Id cache preloaded: {} tools, {} staff", tools, staff);
    }

    let engine = Arc::new(TransactionEngine::new(store.clone(), cache.clone()));
    let history = Arc::new(HistoryEngine::new(store.clone(), cache.clone()));

    // Create application state
    let state = AppState {
        store,
        cache,
        engine,
        history,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Transactions
        .route("/transactions/checkout", post(api::check_out))
        .route("/transactions/checkin", post(api::check_in))
        .route("/transactions/batch-checkout", post(api::batch_check_out))
        .route("/transactions/batch-checkin", post(api::batch_check_in))
        // History
        .route("/history/tool/{toolId}", get(api::tool_history))
        .route("/history/staff/{jobCode}", get(api::staff_history))
        .route("/history/today", get(api::today_transactions))
        // Tools
        .route("/tools", post(api::create_tool))
        .route("/tools/{toolId}/status", get(api::tool_status))
        // Staff
        .route("/staff", post(api::create_staff))
        .route("/staff/{jobCode}", get(api::get_staff))
        // Consumables
        .route("/consumables", post(api::create_consumable))
        .route("/consumables", get(api::list_consumables))
        // Stats
        .route("/stats/activity", get(api::activity))
        .route("/stats/stock", get(api::stock))
        // Admin maintenance
        .route("/admin/cache/reload", post(api::reload_cache))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
