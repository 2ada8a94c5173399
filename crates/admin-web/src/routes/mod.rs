//! Route handlers for the admin web interface.

pub mod agents;
pub mod dashboard;
pub mod health;
pub mod leads;
pub mod rules;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // HTML pages
        .route("/", get(dashboard::dashboard_page))
        // Health check
        .route("/health", get(health::health))
        // Leads
        .route("/api/leads", get(leads::list).post(leads::intake))
        .route("/api/leads/bulk-assign", post(leads::bulk_assign))
        .route("/api/leads/:id", get(leads::detail))
        .route("/api/leads/:id/claim", post(leads::claim))
        .route("/api/leads/:id/assign", post(leads::assign))
        .route("/api/leads/:id/restart", post(leads::restart))
        .route("/api/leads/:id/archive", post(leads::archive))
        .route("/api/leads/:id/unarchive", post(leads::unarchive))
        .route("/api/leads/:id/route", post(leads::reroute))
        .route("/api/leads/:id/contact", post(leads::contact))
        .route("/api/stats", get(dashboard::stats_api))
        // Agents
        .route("/api/agents", get(agents::list).post(agents::register))
        .route("/api/agents/reconcile", post(agents::reconcile))
        .route("/api/agents/:id/availability", patch(agents::set_availability))
        .route("/api/agents/:id/claimable", get(agents::claimable))
        // Routing rules
        .route("/api/rules", get(rules::list).post(rules::create))
        .route("/api/rules/:id", patch(rules::toggle).delete(rules::delete))
}
