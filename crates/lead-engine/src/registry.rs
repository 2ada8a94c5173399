//! Agent registry: capabilities, capacity and availability.

use std::sync::Arc;

use database::agent::{self, CountDrift};
use database::validation::{validate_email, validate_language_code, validate_required, MAX_NAME_LENGTH};
use database::{Agent, Database, NewAgent};
use tracing::info;

use crate::clock::Clock;
use crate::error::{EngineError, Result};

/// Reads and maintains agents.
#[derive(Clone)]
pub struct AgentRegistry {
    database: Database,
    clock: Arc<dyn Clock>,
}

impl AgentRegistry {
    pub fn new(database: Database, clock: Arc<dyn Clock>) -> Self {
        Self { database, clock }
    }

    /// Register an agent after validating the profile.
    pub async fn register(&self, agent: &NewAgent) -> Result<Agent> {
        validate_required("first name", &agent.first_name, MAX_NAME_LENGTH)?;
        validate_required("last name", &agent.last_name, MAX_NAME_LENGTH)?;
        validate_email(&agent.email)?;
        for language in &agent.languages {
            validate_language_code(language)?;
        }
        if agent.max_active_leads < 0 {
            return Err(EngineError::Validation(
                "max_active_leads cannot be negative".to_string(),
            ));
        }

        let created = agent::create_agent(self.database.pool(), agent, self.clock.now()).await?;
        info!(agent_id = %created.id, languages = ?created.languages, "Agent registered");
        Ok(created)
    }

    pub async fn get(&self, agent_id: &str) -> Result<Agent> {
        Ok(agent::get_agent(self.database.pool(), agent_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Agent>> {
        Ok(agent::list_agents(self.database.pool()).await?)
    }

    /// Agents a broadcast for `language` goes to, least loaded first.
    pub async fn eligible_for(&self, language: &str) -> Result<Vec<Agent>> {
        Ok(agent::list_eligible_agents(self.database.pool(), language).await?)
    }

    /// Toggle `is_active` and/or `accepts_new_leads`.
    pub async fn set_availability(
        &self,
        agent_id: &str,
        is_active: Option<bool>,
        accepts_new_leads: Option<bool>,
    ) -> Result<Agent> {
        let updated = agent::set_availability(
            self.database.pool(),
            agent_id,
            is_active,
            accepts_new_leads,
            self.clock.now(),
        )
        .await?;
        info!(
            agent_id = %agent_id,
            is_active = updated.is_active,
            accepts_new_leads = updated.accepts_new_leads,
            "Agent availability changed"
        );
        Ok(updated)
    }

    /// Recompute capacity counts from lead rows and report what drifted.
    pub async fn reconcile(&self) -> Result<Vec<CountDrift>> {
        Ok(agent::reconcile_lead_counts(self.database.pool(), self.clock.now()).await?)
    }
}
