//! Subtitle Translation Server
//!
//! A Rust server that turns raw timed subtitle sequences into
//! progressively-improving bilingual subtitle streams: a fast baseline pass
//! followed by a quality pass, scheduled outward from the viewer's playback
//! position, with ASR caption consolidation and a record store in front.

mod config;
mod config_file;
mod consolidate;
mod cue;
mod error;
mod http;
mod schedule;
mod session;
mod srt;
mod state;
mod store;
mod translate;

#[cfg(test)]
mod integration;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{Result, SubtransError};
use crate::http::create_router;
use crate::state::{AppState, SESSION_TTL_SECS};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "subtrans-server";

/// How often expired records and stale sessions are swept.
const MAINTENANCE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        match crate::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => cf.into_server_config(),
            Err(e) => {
                eprintln!(
                    "Failed to load config file {}: {}. Using defaults.",
                    config_path, e
                );
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };

    // Initialize logging
    init_logging(&config.log_level);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!(
        "Providers: quick={}, quality={}",
        config.providers.quick,
        config.providers.quality
    );

    // Create application state (builds both provider clients)
    let state = Arc::new(AppState::new(config.clone())?);

    // Periodic maintenance: expired records and finished sessions
    let maintenance_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
        interval.tick().await;
        loop {
            interval.tick().await;
            let expired = maintenance_state.store.clear_expired();
            let stale = maintenance_state.cleanup_sessions(SESSION_TTL_SECS);
            if expired > 0 || stale > 0 {
                tracing::debug!(
                    "Maintenance: dropped {} expired records, {} stale sessions",
                    expired,
                    stale
                );
            }
        }
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| SubtransError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("subtrans_server={},tower_http=info", level).into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
