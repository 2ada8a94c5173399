//! Lead activity history.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::LeadActivity;

/// Append a note to a lead's history.
pub async fn record_activity(
    pool: &SqlitePool,
    lead_id: &str,
    actor_id: Option<&str>,
    activity_type: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO lead_activities (lead_id, actor_id, activity_type, notes, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(lead_id)
    .bind(actor_id)
    .bind(activity_type)
    .bind(notes)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// A lead's history in insertion order.
pub async fn list_activities(pool: &SqlitePool, lead_id: &str) -> Result<Vec<LeadActivity>> {
    let activities = sqlx::query_as::<_, LeadActivity>(
        r#"
        SELECT id, lead_id, actor_id, activity_type, notes, created_at
        FROM lead_activities
        WHERE lead_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::{self, tests::sample_lead};
    use crate::Database;

    #[tokio::test]
    async fn test_activity_log_order() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let now = Utc::now();
        let lead = lead::create_lead(db.pool(), &sample_lead("en"), now).await.unwrap();

        record_activity(db.pool(), &lead.id, None, "assignment", "first", now)
            .await
            .unwrap();
        record_activity(db.pool(), &lead.id, Some("admin"), "archive", "second", now)
            .await
            .unwrap();

        let history = list_activities(db.pool(), &lead.id).await.unwrap();
        let notes: Vec<&str> = history.iter().map(|a| a.notes.as_str()).collect();
        assert_eq!(notes, vec!["first", "second"]);
        assert_eq!(history[1].actor_id.as_deref(), Some("admin"));
    }
}
