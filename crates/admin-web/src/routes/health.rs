//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::{AppState, Channels};

#[derive(Serialize)]
pub struct Health {
    pub status: String,
    pub database: bool,
    pub channels: Channels,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.db.ping().await.is_ok();
    Json(Health {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        channels: state.channels,
    })
}

