//! In-app lead notifications.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{ClaimableLead, LeadNotification, NewNotification};

/// Notification type for a broadcast lead that can be claimed.
pub const NEW_LEAD_AVAILABLE: &str = "new_lead_available";
/// Notification type for a lead assigned directly by a routing rule.
pub const RULE_ASSIGNED: &str = "rule_assigned";
/// Notification type for a lead moved to the agent by an admin.
pub const LEAD_REASSIGNED: &str = "lead_reassigned";

/// Insert a batch of notifications in one transaction.
pub async fn insert_notifications(
    pool: &SqlitePool,
    notifications: &[NewNotification],
    now: DateTime<Utc>,
) -> Result<usize> {
    if notifications.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for n in notifications {
        sqlx::query(
            r#"
            INSERT INTO lead_notifications (
                agent_id, lead_id, notification_type, title, message, action_url, read, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&n.agent_id)
        .bind(&n.lead_id)
        .bind(&n.notification_type)
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.action_url)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(notifications.len())
}

/// Notifications for an agent, newest first.
pub async fn list_for_agent(
    pool: &SqlitePool,
    agent_id: &str,
    unread_only: bool,
) -> Result<Vec<LeadNotification>> {
    let rows = sqlx::query_as::<_, LeadNotification>(
        r#"
        SELECT id, agent_id, lead_id, notification_type, title, message, action_url,
               read, read_at, created_at
        FROM lead_notifications
        WHERE agent_id = ? AND (read = 0 OR NOT ?)
        ORDER BY id DESC
        "#,
    )
    .bind(agent_id)
    .bind(unread_only)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Leads an agent was told about that nobody has claimed yet.
pub async fn list_claimable(
    pool: &SqlitePool,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ClaimableLead>> {
    let rows = sqlx::query_as::<_, ClaimableLead>(
        r#"
        SELECT n.id AS notification_id, l.id AS lead_id, l.first_name, l.language,
               l.lead_source, l.lead_segment, l.lead_priority, l.budget_range, l.timeframe,
               l.claim_window_expires_at, l.created_at
        FROM lead_notifications n
        JOIN leads l ON l.id = n.lead_id
        WHERE n.agent_id = ?
          AND n.notification_type = ?
          AND n.read = 0
          AND l.lead_claimed = 0
          AND l.assigned_agent_id IS NULL
          AND l.archived = 0
          AND l.claim_window_expires_at > ?
        ORDER BY l.created_at DESC
        "#,
    )
    .bind(agent_id)
    .bind(NEW_LEAD_AVAILABLE)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Mark an agent's notifications about a lead as read.
pub async fn mark_read_for_lead(
    pool: &SqlitePool,
    agent_id: &str,
    lead_id: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE lead_notifications
        SET read = 1, read_at = ?
        WHERE agent_id = ? AND lead_id = ? AND read = 0
        "#,
    )
    .bind(now)
    .bind(agent_id)
    .bind(lead_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
