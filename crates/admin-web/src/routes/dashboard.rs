//! Dashboard routes.

use askama::Template;
use axum::extract::State;
use axum::Json;
use lead_engine::{LeadFilter, LeadView, QueueStats};

use crate::error::Result;
use crate::state::{AppState, Channels};

/// Number of leads listed on the dashboard.
const RECENT_LEADS: usize = 25;

/// Dashboard page template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub stats: QueueStats,
    pub agents: Vec<AgentRow>,
    pub leads: Vec<LeadRow>,
    pub channels: Channels,
}

/// One agent line: load and availability.
pub struct AgentRow {
    pub name: String,
    pub languages: String,
    pub load: String,
    pub status: &'static str,
}

/// One lead line in the recent leads table.
pub struct LeadRow {
    pub id: String,
    pub name: String,
    pub language: String,
    pub segment: String,
    pub state: &'static str,
    pub agent: String,
    pub flags: String,
    pub created: String,
}

impl From<LeadView> for LeadRow {
    fn from(view: LeadView) -> Self {
        let mut flags = Vec::new();
        if view.sla_breached {
            flags.push("SLA");
        }
        if view.claim_expired {
            flags.push("expired");
        }
        let lead = view.lead;
        Self {
            name: lead.full_name(),
            language: lead.language.to_uppercase(),
            segment: lead.lead_segment.to_string(),
            state: view.state_name,
            agent: lead.assigned_agent_id.clone().unwrap_or_default(),
            flags: flags.join(", "),
            created: lead.created_at.format("%Y-%m-%d %H:%M").to_string(),
            id: lead.id,
        }
    }
}

/// Render the dashboard page.
pub async fn dashboard_page(State(state): State<AppState>) -> Result<DashboardTemplate> {
    let stats = state.leads.reports.stats().await?;

    let agents = state
        .leads
        .registry
        .list()
        .await?
        .into_iter()
        .map(|agent| AgentRow {
            name: agent.display_name(),
            languages: agent.languages.join(", ").to_uppercase(),
            load: format!("{}/{}", agent.current_lead_count, agent.max_active_leads),
            status: if !agent.is_active {
                "inactive"
            } else if !agent.accepts_new_leads {
                "paused"
            } else if !agent.has_capacity() {
                "full"
            } else {
                "available"
            },
        })
        .collect();

    let leads = state
        .leads
        .reports
        .list(&LeadFilter::default())
        .await?
        .into_iter()
        .take(RECENT_LEADS)
        .map(LeadRow::from)
        .collect();

    Ok(DashboardTemplate {
        stats,
        agents,
        leads,
        channels: state.channels,
    })
}

/// Queue statistics as JSON.
pub async fn stats_api(State(state): State<AppState>) -> Result<Json<QueueStats>> {
    Ok(Json(state.leads.reports.stats().await?))
}
