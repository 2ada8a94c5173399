//! Admin web interface and HTTP API for lead routing.
//!
//! Serves the lead intake endpoint, the claim-link target, admin overrides,
//! queue statistics, and a server-rendered dashboard.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use broadcaster::Broadcaster;
use database::Database;
use lead_engine::{EngineConfig, LeadRouter, SystemClock};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::{AppState, Channels};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    info!(addr = %config.addr, app_url = %engine_config.app_url, "Starting admin web server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Delivery channels
    let broadcaster = Broadcaster::from_env()?;
    let channels = Channels {
        email: broadcaster.email_enabled(),
        chat: broadcaster.chat_enabled(),
    };

    // Routing components and the notification worker
    let (leads, _worker) = LeadRouter::start(db.clone(), Arc::new(SystemClock), engine_config, broadcaster);

    // Build application state
    let state = AppState::new(db, leads, channels);

    // Build router
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Admin web server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
