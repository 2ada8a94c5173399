//! Agent registry endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::agent::CountDrift;
use database::{Agent, ClaimableLead, NewAgent};
use serde::Deserialize;

use crate::error::{AdminError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_active: Option<bool>,
    pub accepts_new_leads: Option<bool>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Agent>>> {
    Ok(Json(state.leads.registry.list().await?))
}

pub async fn register(
    State(state): State<AppState>,
    Json(agent): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>)> {
    let created = state.leads.registry.register(&agent).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<Agent>> {
    if req.is_active.is_none() && req.accepts_new_leads.is_none() {
        return Err(AdminError::BadRequest(
            "set is_active and/or accepts_new_leads".to_string(),
        ));
    }
    let agent = state
        .leads
        .registry
        .set_availability(&id, req.is_active, req.accepts_new_leads)
        .await?;
    Ok(Json(agent))
}

/// Recompute capacity counts and report agents that had drifted.
pub async fn reconcile(State(state): State<AppState>) -> Result<Json<Vec<CountDrift>>> {
    Ok(Json(state.leads.registry.reconcile().await?))
}

/// Leads the agent was offered and can still claim.
pub async fn claimable(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClaimableLead>>> {
    Ok(Json(state.leads.claims.claimable_for(&id).await?))
}
