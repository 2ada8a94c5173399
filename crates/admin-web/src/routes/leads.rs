//! Lead intake, claim and admin override endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::{activity, reassignment, Lead, LeadActivity, LeadReassignment};
use lead_engine::{BulkAssignment, ClaimResult, LeadFilter, LeadIntake, LeadView, ReassignReason, Routed};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::state::AppState;

fn default_admin() -> String {
    "admin".to_string()
}

/// Who is performing an override.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    #[serde(default = "default_admin")]
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub agent_id: String,
    #[serde(default = "default_admin")]
    pub admin_id: String,
    #[serde(default)]
    pub reason: ReassignReason,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub lead_ids: Vec<String>,
    pub agent_id: String,
    #[serde(default = "default_admin")]
    pub admin_id: String,
    #[serde(default)]
    pub reason: ReassignReason,
    pub notes: Option<String>,
}

/// A lead with its derived state and history.
#[derive(Serialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub view: LeadView,
    pub activities: Vec<LeadActivity>,
    pub reassignments: Vec<LeadReassignment>,
}

/// Accept a lead from a form or chat widget and route it.
pub async fn intake(
    State(state): State<AppState>,
    Json(intake): Json<LeadIntake>,
) -> Result<(StatusCode, Json<Routed>)> {
    let routed = state.leads.engine.intake(intake).await?;
    info!(lead_id = %routed.lead.id, result = routed.result.label(), "Lead routed");
    Ok((StatusCode::CREATED, Json(routed)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<LeadFilter>,
) -> Result<Json<Vec<LeadView>>> {
    Ok(Json(state.leads.reports.list(&filter).await?))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<LeadDetail>> {
    let view = state.leads.reports.view(&id).await?;
    let activities = activity::list_activities(state.db.pool(), &id).await?;
    let reassignments = reassignment::list_reassignments(state.db.pool(), &id).await?;
    Ok(Json(LeadDetail {
        view,
        activities,
        reassignments,
    }))
}

/// Claim-link target. Losing the race is a normal response.
pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResult>> {
    Ok(Json(state.leads.claims.claim(&id, &req.agent_id).await?))
}

pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Lead>> {
    let lead = state
        .leads
        .admin
        .assign(&id, &req.agent_id, &req.admin_id, req.reason, req.notes.as_deref())
        .await?;
    Ok(Json(lead))
}

pub async fn bulk_assign(
    State(state): State<AppState>,
    Json(req): Json<BulkAssignRequest>,
) -> Result<Json<BulkAssignment>> {
    let result = state
        .leads
        .admin
        .bulk_assign(
            &req.lead_ids,
            &req.agent_id,
            &req.admin_id,
            req.reason,
            req.notes.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Routed>> {
    Ok(Json(state.leads.admin.restart(&id, &req.actor_id).await?))
}

pub async fn archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Lead>> {
    Ok(Json(state.leads.admin.archive(&id, &req.actor_id).await?))
}

pub async fn unarchive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Lead>> {
    Ok(Json(state.leads.admin.unarchive(&id, &req.actor_id).await?))
}

/// Run routing again for an unassigned lead.
pub async fn reroute(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Routed>> {
    Ok(Json(state.leads.admin.reroute(&id).await?))
}

pub async fn contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Lead>> {
    Ok(Json(state.leads.admin.mark_contacted(&id, &req.actor_id).await?))
}
