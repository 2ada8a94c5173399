//! Claim windows: exclusive claims and expiry reporting.

use std::sync::Arc;

use database::{assignment, lead as leads, notification, ClaimOutcome, ClaimableLead, Database, Lead};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::history;
use crate::state::LeadState;

/// Why an agent could not claim a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// Inactive, paused, at capacity, or does not speak the lead's language.
    AgentUnavailable,
    /// The claim window closed before the claim arrived.
    WindowExpired,
}

/// Result of a claim attempt. Losing a race is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClaimResult {
    Claimed { lead: Box<Lead> },
    AlreadyClaimed,
    NotEligible { reason: IneligibleReason },
}

/// Handles claims against open broadcast windows.
#[derive(Clone)]
pub struct ClaimTracker {
    database: Database,
    clock: Arc<dyn Clock>,
}

impl ClaimTracker {
    pub fn new(database: Database, clock: Arc<dyn Clock>) -> Self {
        Self { database, clock }
    }

    /// Claim `lead_id` for `agent_id`. Exactly one of any number of concurrent
    /// claimers succeeds.
    ///
    /// Once the window has passed the lead stays unclaimed until an admin
    /// restarts or assigns it.
    pub async fn claim(&self, lead_id: &str, agent_id: &str) -> Result<ClaimResult> {
        let now = self.clock.now();
        let outcome = assignment::claim_lead(self.database.pool(), lead_id, agent_id, now).await?;

        match outcome {
            ClaimOutcome::Claimed(lead) => {
                info!(lead_id = %lead_id, agent_id = %agent_id, "Lead claimed");
                history::note(
                    &self.database,
                    lead_id,
                    Some(agent_id),
                    history::CLAIM,
                    "Lead claimed from broadcast",
                    now,
                )
                .await;
                Ok(ClaimResult::Claimed {
                    lead: Box::new(lead),
                })
            }
            ClaimOutcome::AlreadyClaimed => {
                debug!(lead_id = %lead_id, agent_id = %agent_id, "Claim lost");
                Ok(ClaimResult::AlreadyClaimed)
            }
            ClaimOutcome::AgentNotEligible => {
                debug!(lead_id = %lead_id, agent_id = %agent_id, "Agent not eligible to claim");
                Ok(ClaimResult::NotEligible {
                    reason: IneligibleReason::AgentUnavailable,
                })
            }
            ClaimOutcome::WindowExpired => {
                debug!(lead_id = %lead_id, agent_id = %agent_id, "Claim after window closed");
                Ok(ClaimResult::NotEligible {
                    reason: IneligibleReason::WindowExpired,
                })
            }
            ClaimOutcome::Archived => Err(EngineError::InvalidTransition {
                lead_id: lead_id.to_string(),
                state: "archived".to_string(),
                operation: "claim",
            }),
            ClaimOutcome::WindowNotOpen => Err(EngineError::InvalidTransition {
                lead_id: lead_id.to_string(),
                state: "unassigned".to_string(),
                operation: "claim",
            }),
        }
    }

    /// Broadcast leads whose window has passed without a claim.
    pub async fn expired(&self) -> Result<Vec<Lead>> {
        let now = self.clock.now();
        let all = leads::list_leads(self.database.pool(), false).await?;
        Ok(all
            .into_iter()
            .filter(|lead| LeadState::of(lead).is_expired(now))
            .collect())
    }

    /// Leads an agent was offered and can still claim, without contact details.
    pub async fn claimable_for(&self, agent_id: &str) -> Result<Vec<ClaimableLead>> {
        // Surface an unknown agent as an error rather than an empty list.
        database::agent::get_agent(self.database.pool(), agent_id).await?;
        Ok(notification::list_claimable(self.database.pool(), agent_id, self.clock.now()).await?)
    }
}
