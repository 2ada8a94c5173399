//! Routing rule management endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::{NewRoutingRule, RoutingRule};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub is_active: bool,
}

/// All rules, highest priority first.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<RoutingRule>>> {
    Ok(Json(state.leads.admin.list_rules().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(rule): Json<NewRoutingRule>,
) -> Result<(StatusCode, Json<RoutingRule>)> {
    let created = state.leads.admin.create_rule(&rule).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<RoutingRule>> {
    Ok(Json(state.leads.admin.set_rule_active(&id, req.is_active).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.leads.admin.delete_rule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
