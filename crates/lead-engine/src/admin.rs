//! Admin overrides: manual and bulk assignment, restart, archive, re-route,
//! contact recording and rule management.

use std::str::FromStr;
use std::sync::Arc;

use database::validation::{validate_language_code, validate_required, MAX_NAME_LENGTH};
use database::{
    agent, assignment, lead as leads, routing_rule, AdminAssignment, AssignmentMethod, Database,
    Lead, LeadSegment, NewRoutingRule, RoutingRule,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatcher::{LeadNotice, NoticeKind};
use crate::engine::{AssignmentEngine, Routed};
use crate::error::{EngineError, Result};
use crate::history;
use crate::queue::NotificationSink;
use crate::state::{LeadState, Operation};

/// Why an admin moved a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignReason {
    /// Nobody claimed it in time.
    Unclaimed,
    /// The holder never reached the lead.
    NoContact,
    #[default]
    Manual,
}

impl ReassignReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReassignReason::Unclaimed => "unclaimed",
            ReassignReason::NoContact => "no_contact",
            ReassignReason::Manual => "manual",
        }
    }
}

/// Result of a bulk assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkAssignment {
    pub agent_id: String,
    /// Leads that changed hands.
    pub moved: usize,
    pub leads: Vec<Lead>,
}

/// Manual operations available to admins.
#[derive(Clone)]
pub struct AdminOverrides {
    database: Database,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    engine: AssignmentEngine,
    sink: Arc<dyn NotificationSink>,
}

impl AdminOverrides {
    pub fn new(
        database: Database,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        engine: AssignmentEngine,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            database,
            clock,
            config,
            engine,
            sink,
        }
    }

    /// Assign or reassign one lead to an agent.
    pub async fn assign(
        &self,
        lead_id: &str,
        agent_id: &str,
        admin_id: &str,
        reason: ReassignReason,
        notes: Option<&str>,
    ) -> Result<Lead> {
        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
        LeadState::of(&lead).check(lead_id, Operation::Assign)?;

        let ids = [lead_id.to_string()];
        let mut result = self
            .move_leads(&ids, agent_id, admin_id, AssignmentMethod::AdminAssigned, reason, notes)
            .await?;
        result
            .leads
            .pop()
            .ok_or_else(|| EngineError::LeadNotFound(lead_id.to_string()))
    }

    /// Assign a batch of leads to one agent. Rejected as a whole if the agent
    /// lacks capacity for the leads it does not already hold.
    pub async fn bulk_assign(
        &self,
        lead_ids: &[String],
        agent_id: &str,
        admin_id: &str,
        reason: ReassignReason,
        notes: Option<&str>,
    ) -> Result<BulkAssignment> {
        if lead_ids.is_empty() {
            return Err(EngineError::Validation("no leads selected".to_string()));
        }
        self.move_leads(
            lead_ids,
            agent_id,
            admin_id,
            AssignmentMethod::AdminBulkAssigned,
            reason,
            notes,
        )
        .await
    }

    async fn move_leads(
        &self,
        lead_ids: &[String],
        agent_id: &str,
        admin_id: &str,
        method: AssignmentMethod,
        reason: ReassignReason,
        notes: Option<&str>,
    ) -> Result<BulkAssignment> {
        validate_required("admin id", admin_id, MAX_NAME_LENGTH)?;
        let now = self.clock.now();
        let request = AdminAssignment {
            lead_ids,
            agent_id,
            method,
            reassigned_by: admin_id,
            reason: reason.as_str(),
            notes,
        };
        let moved = assignment::admin_assign(self.database.pool(), &request, now).await?;

        let target = agent::get_agent(self.database.pool(), agent_id).await?;
        let mut changed = 0;
        for entry in &moved {
            if !entry.moved {
                continue;
            }
            changed += 1;
            let note = match &entry.previous_agent_id {
                Some(previous) => format!(
                    "Lead reassigned from agent {} to {} by {} ({})",
                    previous,
                    target.display_name(),
                    admin_id,
                    reason.as_str()
                ),
                None => format!(
                    "Lead assigned to {} by {} ({})",
                    target.display_name(),
                    admin_id,
                    reason.as_str()
                ),
            };
            history::note(
                &self.database,
                &entry.lead.id,
                Some(admin_id),
                history::REASSIGNMENT,
                &note,
                now,
            )
            .await;
            self.sink.submit(LeadNotice {
                lead: entry.lead.clone(),
                agents: vec![target.clone()],
                kind: NoticeKind::Reassigned {
                    previous_agent_id: entry.previous_agent_id.clone(),
                },
            });
        }

        info!(
            agent_id = %agent_id,
            method = %method,
            requested = lead_ids.len(),
            moved = changed,
            "Admin assignment complete"
        );

        Ok(BulkAssignment {
            agent_id: agent_id.to_string(),
            moved: changed,
            leads: moved.into_iter().map(|m| m.lead).collect(),
        })
    }

    /// Release the current holder, open a fresh claim window and re-broadcast.
    pub async fn restart(&self, lead_id: &str, admin_id: &str) -> Result<Routed> {
        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
        LeadState::of(&lead).check(lead_id, Operation::Restart)?;

        let now = self.clock.now();
        let expires_at = now + self.config.claim_window;
        let restarted =
            assignment::restart_round_robin(self.database.pool(), lead_id, expires_at, now).await?;

        let note = match &restarted.released_agent_id {
            Some(agent_id) => format!("Round robin restarted by {}; agent {} released", admin_id, agent_id),
            None => format!("Round robin restarted by {}", admin_id),
        };
        history::note(&self.database, lead_id, Some(admin_id), history::RESTART, &note, now).await;
        info!(lead_id = %lead_id, released = ?restarted.released_agent_id, "Round robin restarted");

        self.engine
            .announce(restarted.lead, None, expires_at, now)
            .await
    }

    /// Archive a lead and free its agent's slot.
    pub async fn archive(&self, lead_id: &str, admin_id: &str) -> Result<Lead> {
        let now = self.clock.now();
        let archived = assignment::archive_lead(self.database.pool(), lead_id, now).await?;
        if archived.changed {
            history::note(
                &self.database,
                lead_id,
                Some(admin_id),
                history::ARCHIVE,
                &format!("Lead archived by {}", admin_id),
                now,
            )
            .await;
            info!(lead_id = %lead_id, released = ?archived.released_agent_id, "Lead archived");
        }
        Ok(archived.lead)
    }

    /// Clear the archived flag. The lead stays unassigned until re-routed.
    pub async fn unarchive(&self, lead_id: &str, admin_id: &str) -> Result<Lead> {
        let now = self.clock.now();
        let unarchived = assignment::unarchive_lead(self.database.pool(), lead_id, now).await?;
        if unarchived.changed {
            history::note(
                &self.database,
                lead_id,
                Some(admin_id),
                history::UNARCHIVE,
                &format!("Lead unarchived by {}", admin_id),
                now,
            )
            .await;
            info!(lead_id = %lead_id, "Lead unarchived");
        }
        Ok(unarchived.lead)
    }

    /// Run the routing engine again for an unassigned lead.
    pub async fn reroute(&self, lead_id: &str) -> Result<Routed> {
        self.engine.assign(lead_id).await
    }

    /// Record that the holder reached the lead. Clears SLA breach.
    pub async fn mark_contacted(&self, lead_id: &str, actor_id: &str) -> Result<Lead> {
        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
        LeadState::of(&lead).check(lead_id, Operation::Contact)?;

        let now = self.clock.now();
        let lead = leads::mark_contacted(self.database.pool(), lead_id, now).await?;
        history::note(
            &self.database,
            lead_id,
            Some(actor_id),
            history::CONTACT,
            "Contact recorded",
            now,
        )
        .await;
        Ok(lead)
    }

    /// Create a routing rule after validating its criteria.
    pub async fn create_rule(&self, rule: &NewRoutingRule) -> Result<RoutingRule> {
        validate_required("rule name", &rule.rule_name, MAX_NAME_LENGTH)?;
        for language in &rule.match_language {
            validate_language_code(language)?;
        }
        for segment in &rule.match_lead_segment {
            LeadSegment::from_str(segment).map_err(EngineError::Validation)?;
        }

        let created = routing_rule::create_rule(self.database.pool(), rule, self.clock.now())
            .await
            .map_err(|err| match EngineError::from(err) {
                EngineError::AgentNotFound(id) => {
                    EngineError::Validation(format!("unknown target agent: {}", id))
                }
                other => other,
            })?;
        info!(rule_id = %created.id, rule = %created.rule_name, priority = created.priority, "Routing rule created");
        Ok(created)
    }

    pub async fn list_rules(&self) -> Result<Vec<RoutingRule>> {
        Ok(routing_rule::list_rules(self.database.pool()).await?)
    }

    pub async fn set_rule_active(&self, rule_id: &str, is_active: bool) -> Result<RoutingRule> {
        let rule = routing_rule::set_rule_active(self.database.pool(), rule_id, is_active).await?;
        info!(rule_id = %rule_id, is_active, "Routing rule toggled");
        Ok(rule)
    }

    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        routing_rule::delete_rule(self.database.pool(), rule_id).await?;
        info!(rule_id = %rule_id, "Routing rule deleted");
        Ok(())
    }
}
