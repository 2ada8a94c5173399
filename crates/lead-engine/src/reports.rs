//! Read-only queue projections for the admin surface.
//!
//! Nothing here writes. SLA breach and claim expiry are classifications of the
//! stored rows at the current clock time.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{lead as leads, Database, Lead, LeadPriority, LeadSegment};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::state::LeadState;

/// Counts behind the admin queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Non-archived leads.
    pub total: usize,
    /// Not archived and not held by anyone.
    pub unclaimed: usize,
    pub claimed: usize,
    /// Claimed but contact not completed.
    pub incomplete_contact: usize,
    pub sla_breach: usize,
    /// Broadcast past its window with no claim.
    pub expired_claim: usize,
    pub archived: usize,
    /// Unassigned with no open window.
    pub unresolved: usize,
}

/// Which queue a listing draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    All,
    Unclaimed,
    Claimed,
    Incomplete,
    SlaBreach,
    ExpiredClaim,
}

impl FromStr for LeadStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(LeadStatus::All),
            "unclaimed" => Ok(LeadStatus::Unclaimed),
            "claimed" => Ok(LeadStatus::Claimed),
            "incomplete" => Ok(LeadStatus::Incomplete),
            "sla_breach" => Ok(LeadStatus::SlaBreach),
            "expired_claim" => Ok(LeadStatus::ExpiredClaim),
            other => Err(EngineError::Validation(format!("unknown lead status: {}", other))),
        }
    }
}

/// Admin lead listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFilter {
    pub status: LeadStatus,
    pub language: Option<String>,
    pub segment: Option<LeadSegment>,
    pub priority: Option<LeadPriority>,
    /// Case-insensitive match on name, email or phone.
    pub search: Option<String>,
    pub include_archived: bool,
}

/// A lead with its derived classifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub lead: Lead,
    pub state: LeadState,
    /// State name, `expired` for a lapsed broadcast.
    pub state_name: &'static str,
    pub sla_breached: bool,
    pub claim_expired: bool,
}

impl LeadView {
    fn classify(lead: Lead, now: DateTime<Utc>, config: &EngineConfig) -> Self {
        let state = LeadState::of(&lead);
        let sla_breached = is_sla_breach(&lead, &state, now, config);
        let claim_expired = state.is_expired(now);
        Self {
            state_name: state.display_name(now),
            lead,
            state,
            sla_breached,
            claim_expired,
        }
    }

    fn in_status(&self, status: LeadStatus) -> bool {
        match status {
            LeadStatus::All => true,
            LeadStatus::Unclaimed => {
                matches!(self.state, LeadState::Unassigned | LeadState::BroadcastOpen { .. })
            }
            LeadStatus::Claimed => matches!(self.state, LeadState::Claimed { .. }),
            LeadStatus::Incomplete => {
                matches!(self.state, LeadState::Claimed { .. }) && !self.lead.contact_complete
            }
            LeadStatus::SlaBreach => self.sla_breached,
            LeadStatus::ExpiredClaim => self.claim_expired,
        }
    }

    fn matches(&self, filter: &LeadFilter) -> bool {
        if !self.in_status(filter.status) {
            return false;
        }
        if let Some(language) = &filter.language {
            if !self.lead.language.eq_ignore_ascii_case(language) {
                return false;
            }
        }
        if filter.segment.is_some_and(|s| s != self.lead.lead_segment) {
            return false;
        }
        if filter.priority.is_some_and(|p| p != self.lead.lead_priority) {
            return false;
        }
        match filter.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                let lead = &self.lead;
                lead.full_name().to_lowercase().contains(&term)
                    || lead
                        .email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&term))
                    || lead.phone_number.contains(&term)
            }
            _ => true,
        }
    }
}

/// Claimed more than the SLA window ago and never contacted.
pub fn is_sla_breach(
    lead: &Lead,
    state: &LeadState,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> bool {
    match state {
        LeadState::Claimed {
            assigned_at: Some(assigned_at),
            ..
        } => lead.last_contact_at.is_none() && *assigned_at <= now - config.sla_breach_after,
        _ => false,
    }
}

/// Queue statistics and filtered listings.
#[derive(Clone)]
pub struct QueueReports {
    database: Database,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl QueueReports {
    pub fn new(database: Database, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            database,
            clock,
            config,
        }
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let now = self.clock.now();
        let all = leads::list_leads(self.database.pool(), true).await?;

        let mut stats = QueueStats::default();
        for lead in all {
            let view = LeadView::classify(lead, now, &self.config);
            match &view.state {
                LeadState::Archived => {
                    stats.archived += 1;
                    continue;
                }
                LeadState::Unassigned => {
                    stats.unclaimed += 1;
                    stats.unresolved += 1;
                }
                LeadState::BroadcastOpen { .. } => stats.unclaimed += 1,
                LeadState::Claimed { .. } => {
                    stats.claimed += 1;
                    if !view.lead.contact_complete {
                        stats.incomplete_contact += 1;
                    }
                }
            }
            stats.total += 1;
            if view.sla_breached {
                stats.sla_breach += 1;
            }
            if view.claim_expired {
                stats.expired_claim += 1;
            }
        }
        Ok(stats)
    }

    /// Leads matching `filter`, newest first.
    pub async fn list(&self, filter: &LeadFilter) -> Result<Vec<LeadView>> {
        let now = self.clock.now();
        let all = leads::list_leads(self.database.pool(), filter.include_archived).await?;
        Ok(all
            .into_iter()
            .map(|lead| LeadView::classify(lead, now, &self.config))
            .filter(|view| view.matches(filter))
            .collect())
    }

    pub async fn view(&self, lead_id: &str) -> Result<LeadView> {
        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
        Ok(LeadView::classify(lead, self.clock.now(), &self.config))
    }
}
