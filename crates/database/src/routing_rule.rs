//! Routing rule operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{NewRoutingRule, RoutingRule};

fn normalize(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Create a routing rule. The target agent must exist.
pub async fn create_rule(
    pool: &SqlitePool,
    rule: &NewRoutingRule,
    now: DateTime<Utc>,
) -> Result<RoutingRule> {
    let agent_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM agents WHERE id = ?)")
        .bind(&rule.assign_to_agent_id)
        .fetch_one(pool)
        .await?;
    if !agent_exists {
        return Err(DatabaseError::agent_not_found(&rule.assign_to_agent_id));
    }

    let id = Uuid::new_v4().to_string();
    let languages: Vec<String> = normalize(&rule.match_language)
        .into_iter()
        .map(|l| l.to_lowercase())
        .collect();

    sqlx::query(
        r#"
        INSERT INTO routing_rules (
            id, rule_name, description, priority, is_active,
            match_language, match_lead_source, match_page_type, match_page_slug,
            match_lead_segment, match_budget_range, match_property_type, match_timeframe,
            assign_to_agent_id, fallback_to_broadcast, total_matches, created_at
        )
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(rule.rule_name.trim())
    .bind(&rule.description)
    .bind(rule.priority)
    .bind(Json(&languages))
    .bind(Json(normalize(&rule.match_lead_source)))
    .bind(Json(normalize(&rule.match_page_type)))
    .bind(Json(normalize(&rule.match_page_slug)))
    .bind(Json(normalize(&rule.match_lead_segment)))
    .bind(Json(normalize(&rule.match_budget_range)))
    .bind(Json(normalize(&rule.match_property_type)))
    .bind(Json(normalize(&rule.match_timeframe)))
    .bind(&rule.assign_to_agent_id)
    .bind(rule.fallback_to_broadcast)
    .bind(now)
    .execute(pool)
    .await?;

    get_rule(pool, &id).await
}

/// Get a routing rule by ID.
pub async fn get_rule(pool: &SqlitePool, id: &str) -> Result<RoutingRule> {
    sqlx::query_as::<_, RoutingRule>("SELECT * FROM routing_rules WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "RoutingRule",
            id: id.to_string(),
        })
}

/// Active rules in evaluation order: priority descending, then creation order.
pub async fn list_active_rules(pool: &SqlitePool) -> Result<Vec<RoutingRule>> {
    let rules = sqlx::query_as::<_, RoutingRule>(
        r#"
        SELECT * FROM routing_rules
        WHERE is_active = 1
        ORDER BY priority DESC, created_at ASC, rowid ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rules)
}

/// All rules, active or not, in evaluation order.
pub async fn list_rules(pool: &SqlitePool) -> Result<Vec<RoutingRule>> {
    let rules = sqlx::query_as::<_, RoutingRule>(
        r#"
        SELECT * FROM routing_rules
        ORDER BY priority DESC, created_at ASC, rowid ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rules)
}

/// Enable or disable a rule.
pub async fn set_rule_active(pool: &SqlitePool, id: &str, is_active: bool) -> Result<RoutingRule> {
    let result = sqlx::query("UPDATE routing_rules SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "RoutingRule",
            id: id.to_string(),
        });
    }

    get_rule(pool, id).await
}

/// Delete a rule. Leads that were routed by it keep their assignment.
pub async fn delete_rule(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM routing_rules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "RoutingRule",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Count a win for `id`.
pub async fn record_match(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE routing_rules
        SET total_matches = total_matches + 1, last_matched_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
