//! Lead assignment engine: rule evaluation, direct assignment or broadcast.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{agent, assignment, lead as leads, routing_rule, Database, Lead};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::criteria::LeadSnapshot;
use crate::dispatcher::{LeadNotice, NoticeKind};
use crate::error::Result;
use crate::history;
use crate::intake::LeadIntake;
use crate::queue::NotificationSink;
use crate::rules::{RuleOutcome, RuleSet};
use crate::state::{LeadState, Operation};

/// How a lead was routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssignmentResult {
    /// A rule's target agent took the lead.
    Direct {
        agent_id: String,
        rule_id: String,
        rule_name: String,
    },
    /// A claim window is open and the eligible agents were notified.
    Broadcast {
        eligible_agent_ids: Vec<String>,
        expires_at: DateTime<Utc>,
        /// Rule that matched but fell back, if any.
        rule_id: Option<String>,
    },
    /// A rule matched, its agent could not take the lead, and the rule does
    /// not fall back. Left for an admin.
    Unresolved {
        rule_id: String,
        rule_name: String,
        target_agent_id: String,
    },
}

impl AssignmentResult {
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentResult::Direct { .. } => "direct",
            AssignmentResult::Broadcast { .. } => "broadcast",
            AssignmentResult::Unresolved { .. } => "unresolved",
        }
    }
}

/// A lead together with the routing decision made for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routed {
    pub lead: Lead,
    pub result: AssignmentResult,
}

/// Routes leads to agents.
#[derive(Clone)]
pub struct AssignmentEngine {
    database: Database,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    sink: Arc<dyn NotificationSink>,
}

impl AssignmentEngine {
    pub fn new(
        database: Database,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            database,
            clock,
            config,
            sink,
        }
    }

    /// Validate, store and route a new lead.
    pub async fn intake(&self, intake: LeadIntake) -> Result<Routed> {
        let new_lead = intake.into_new_lead(&self.config.default_language)?;
        let lead = leads::create_lead(self.database.pool(), &new_lead, self.clock.now()).await?;
        info!(
            lead_id = %lead.id,
            language = %lead.language,
            segment = %lead.lead_segment,
            score = lead.lead_score,
            "Lead received"
        );
        self.assign(&lead.id).await
    }

    /// Route an unassigned lead.
    ///
    /// 1. Evaluate the active rules.
    /// 2. If a rule matches and its agent is eligible, assign directly.
    /// 3. If the agent is not eligible and the rule has no fallback, leave the
    ///    lead unresolved.
    /// 4. Otherwise open a claim window and notify every eligible agent.
    pub async fn assign(&self, lead_id: &str) -> Result<Routed> {
        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
        LeadState::of(&lead).check(lead_id, Operation::Route)?;

        let rules = RuleSet::load(&self.database).await?;
        let outcome = rules.evaluate(&LeadSnapshot::from(&lead));
        let now = self.clock.now();

        let fallback_rule = match outcome {
            RuleOutcome::NoMatch => {
                info!(lead_id = %lead_id, rules = rules.len(), "No routing rule matched");
                None
            }
            RuleOutcome::Matched {
                rule_id,
                rule_name,
                target_agent_id,
                fallback_to_broadcast,
            } => {
                if let Err(err) = routing_rule::record_match(self.database.pool(), &rule_id, now).await {
                    warn!(rule_id = %rule_id, error = %err, "Failed to record rule match");
                }

                match assignment::assign_direct(
                    self.database.pool(),
                    lead_id,
                    &target_agent_id,
                    Some(&rule_id),
                    now,
                )
                .await?
                {
                    Some(assigned) => {
                        return self
                            .finish_direct(assigned, target_agent_id, rule_id, rule_name, now)
                            .await;
                    }
                    None if !fallback_to_broadcast => {
                        info!(
                            lead_id = %lead_id,
                            rule = %rule_name,
                            agent_id = %target_agent_id,
                            "Rule agent unavailable and no fallback; lead left for admin"
                        );
                        history::note(
                            &self.database,
                            lead_id,
                            None,
                            history::ASSIGNMENT,
                            &format!(
                                "Routing rule \"{}\" matched but its agent is unavailable; awaiting admin assignment",
                                rule_name
                            ),
                            now,
                        )
                        .await;
                        let lead = leads::get_lead(self.database.pool(), lead_id).await?;
                        return Ok(Routed {
                            lead,
                            result: AssignmentResult::Unresolved {
                                rule_id,
                                rule_name,
                                target_agent_id,
                            },
                        });
                    }
                    None => {
                        info!(
                            lead_id = %lead_id,
                            rule = %rule_name,
                            agent_id = %target_agent_id,
                            "Rule agent unavailable; falling back to broadcast"
                        );
                        Some(rule_id)
                    }
                }
            }
        };

        self.broadcast(lead_id, fallback_rule, now).await
    }

    async fn finish_direct(
        &self,
        lead: Lead,
        agent_id: String,
        rule_id: String,
        rule_name: String,
        now: DateTime<Utc>,
    ) -> Result<Routed> {
        info!(lead_id = %lead.id, agent_id = %agent_id, rule = %rule_name, "Lead assigned by rule");

        history::note(
            &self.database,
            &lead.id,
            Some(&agent_id),
            history::ASSIGNMENT,
            &format!("Lead automatically assigned via routing rule \"{}\"", rule_name),
            now,
        )
        .await;

        match agent::get_agent(self.database.pool(), &agent_id).await {
            Ok(target) => self.sink.submit(LeadNotice {
                lead: lead.clone(),
                agents: vec![target],
                kind: NoticeKind::RuleAssigned {
                    rule_name: rule_name.clone(),
                },
            }),
            Err(err) => warn!(agent_id = %agent_id, error = %err, "Could not load agent for notification"),
        }

        Ok(Routed {
            lead,
            result: AssignmentResult::Direct {
                agent_id,
                rule_id,
                rule_name,
            },
        })
    }

    /// Open a claim window and notify the eligible agents.
    pub(crate) async fn broadcast(
        &self,
        lead_id: &str,
        rule_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Routed> {
        let expires_at = now + self.config.claim_window;
        let lead = assignment::open_claim_window(
            self.database.pool(),
            lead_id,
            rule_id.as_deref(),
            expires_at,
            now,
        )
        .await?;
        self.announce(lead, rule_id, expires_at, now).await
    }

    /// Notify eligible agents about a lead whose window is already open.
    pub(crate) async fn announce(
        &self,
        lead: Lead,
        rule_id: Option<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Routed> {
        let eligible = agent::list_eligible_agents(self.database.pool(), &lead.language).await?;
        let eligible_agent_ids: Vec<String> = eligible.iter().map(|a| a.id.clone()).collect();

        if eligible.is_empty() {
            warn!(lead_id = %lead.id, language = %lead.language, "No eligible agents; lead needs admin assignment");
        } else {
            info!(lead_id = %lead.id, eligible = eligible.len(), "Lead broadcast to eligible agents");
        }

        history::note(
            &self.database,
            &lead.id,
            None,
            history::ASSIGNMENT,
            &format!(
                "Lead broadcast to {} eligible agent(s); claim window open until {}",
                eligible.len(),
                expires_at.to_rfc3339()
            ),
            now,
        )
        .await;

        if !eligible.is_empty() {
            self.sink.submit(LeadNotice {
                lead: lead.clone(),
                agents: eligible,
                kind: NoticeKind::Broadcast,
            });
        }

        Ok(Routed {
            lead,
            result: AssignmentResult::Broadcast {
                eligible_agent_ids,
                expires_at,
                rule_id,
            },
        })
    }
}
