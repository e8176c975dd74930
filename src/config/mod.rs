//! Configuration module for the ToolCrib backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Preload the identifier mapping cache at startup
    pub preload_cache: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("TOOLCRIB_API_PSK").ok();

        let db_path = env::var("TOOLCRIB_DB_PATH")
            .unwrap_or_else(|_| "./data/toolcrib.sqlite".to_string())
            .into();

        let bind_addr = env::var("TOOLCRIB_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid TOOLCRIB_BIND_ADDR format");

        let log_level = env::var("TOOLCRIB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let preload_cache = env::var("TOOLCRIB_PRELOAD_CACHE")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            preload_cache,
        }
    }
}
