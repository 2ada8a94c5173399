//! Reassignment history reads. Rows are written by [`crate::assignment`].

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::LeadReassignment;

/// Every recorded move of a lead, oldest first.
pub async fn list_reassignments(pool: &SqlitePool, lead_id: &str) -> Result<Vec<LeadReassignment>> {
    let rows = sqlx::query_as::<_, LeadReassignment>(
        r#"
        SELECT id, lead_id, from_agent_id, to_agent_id, reassigned_by, reason, notes, created_at
        FROM lead_reassignments
        WHERE lead_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
