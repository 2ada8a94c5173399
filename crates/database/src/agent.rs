//! Agent registry operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{Agent, NewAgent};

/// Register a new agent. Language codes are stored lower-cased.
pub async fn create_agent(pool: &SqlitePool, agent: &NewAgent, now: DateTime<Utc>) -> Result<Agent> {
    let id = Uuid::new_v4().to_string();
    let languages: Vec<String> = agent
        .languages
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();

    sqlx::query(
        r#"
        INSERT INTO agents (
            id, first_name, last_name, email, languages, chat_channel_id, chat_user_id,
            email_notifications, chat_notifications, max_active_leads, current_lead_count,
            is_active, accepts_new_leads, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(agent.first_name.trim())
    .bind(agent.last_name.trim())
    .bind(agent.email.trim())
    .bind(Json(&languages))
    .bind(&agent.chat_channel_id)
    .bind(&agent.chat_user_id)
    .bind(agent.email_notifications)
    .bind(agent.chat_notifications)
    .bind(agent.max_active_leads)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Agent",
                    id: agent.email.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    get_agent(pool, &id).await
}

/// Get an agent by ID.
pub async fn get_agent(pool: &SqlitePool, id: &str) -> Result<Agent> {
    sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::agent_not_found(id))
}

/// List all agents by name.
pub async fn list_agents(pool: &SqlitePool) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(
        r#"
        SELECT * FROM agents
        ORDER BY first_name, last_name, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(agents)
}

/// Agents that may receive a broadcast for `language`, least loaded first.
pub async fn list_eligible_agents(pool: &SqlitePool, language: &str) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(
        r#"
        SELECT * FROM agents
        WHERE is_active = 1
          AND accepts_new_leads = 1
          AND current_lead_count < max_active_leads
          AND EXISTS (SELECT 1 FROM json_each(agents.languages) WHERE value = ?)
        ORDER BY current_lead_count ASC, created_at ASC, id ASC
        "#,
    )
    .bind(language.to_lowercase())
    .fetch_all(pool)
    .await?;

    Ok(agents)
}

/// Set the availability flags of an agent.
pub async fn set_availability(
    pool: &SqlitePool,
    id: &str,
    is_active: Option<bool>,
    accepts_new_leads: Option<bool>,
    now: DateTime<Utc>,
) -> Result<Agent> {
    let result = sqlx::query(
        r#"
        UPDATE agents
        SET is_active = COALESCE(?, is_active),
            accepts_new_leads = COALESCE(?, accepts_new_leads),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(is_active)
    .bind(accepts_new_leads)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::agent_not_found(id));
    }

    get_agent(pool, id).await
}

/// Number of leads that actually count against an agent's capacity.
pub async fn count_held_leads(pool: &SqlitePool, agent_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM leads
        WHERE assigned_agent_id = ? AND lead_claimed = 1 AND archived = 0
        "#,
    )
    .bind(agent_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// An agent whose stored count disagreed with its lead rows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CountDrift {
    pub agent_id: String,
    pub stored: i64,
    pub actual: i64,
}

/// Recompute every agent's `current_lead_count` from lead rows.
///
/// Returns the agents whose count was corrected.
pub async fn reconcile_lead_counts(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<CountDrift>> {
    let mut tx = pool.begin().await?;

    // Take the write lock before reading so the drift report matches the update.
    sqlx::query("UPDATE agents SET updated_at = updated_at WHERE 0")
        .execute(&mut *tx)
        .await?;

    let drift = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT id, stored, actual FROM (
            SELECT a.id AS id, a.current_lead_count AS stored,
                   (SELECT COUNT(*) FROM leads l
                    WHERE l.assigned_agent_id = a.id AND l.lead_claimed = 1 AND l.archived = 0) AS actual
            FROM agents a
        )
        WHERE stored != actual
        ORDER BY id
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    if !drift.is_empty() {
        sqlx::query(
            r#"
            UPDATE agents
            SET current_lead_count = (
                    SELECT COUNT(*) FROM leads l
                    WHERE l.assigned_agent_id = agents.id AND l.lead_claimed = 1 AND l.archived = 0
                ),
                updated_at = ?
            WHERE current_lead_count != (
                    SELECT COUNT(*) FROM leads l
                    WHERE l.assigned_agent_id = agents.id AND l.lead_claimed = 1 AND l.archived = 0
                )
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let drift: Vec<CountDrift> = drift
        .into_iter()
        .map(|(agent_id, stored, actual)| CountDrift {
            agent_id,
            stored,
            actual,
        })
        .collect();

    for d in &drift {
        tracing::warn!(
            agent_id = %d.agent_id,
            stored = d.stored,
            actual = d.actual,
            "Corrected agent lead count"
        );
    }

    Ok(drift)
}
