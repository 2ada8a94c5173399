//! Lead storage operations.
//!
//! Writes that move a lead between agents live in [`crate::assignment`]; this
//! module only handles intake, reads and contact bookkeeping.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{Lead, NewLead};

/// Insert a new, unassigned lead.
pub async fn create_lead(pool: &SqlitePool, lead: &NewLead, now: DateTime<Utc>) -> Result<Lead> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO leads (
            id, first_name, last_name, phone_number, country_prefix, email, language,
            lead_source, lead_source_detail, page_type, page_slug, page_url, message,
            budget_range, location_preference, property_type, timeframe,
            lead_score, lead_segment, lead_priority, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&lead.first_name)
    .bind(&lead.last_name)
    .bind(&lead.phone_number)
    .bind(&lead.country_prefix)
    .bind(&lead.email)
    .bind(&lead.language)
    .bind(&lead.lead_source)
    .bind(&lead.lead_source_detail)
    .bind(&lead.page_type)
    .bind(&lead.page_slug)
    .bind(&lead.page_url)
    .bind(&lead.message)
    .bind(&lead.budget_range)
    .bind(Json(&lead.location_preference))
    .bind(Json(&lead.property_type))
    .bind(&lead.timeframe)
    .bind(lead.lead_score)
    .bind(lead.lead_segment)
    .bind(lead.lead_priority)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_lead(pool, &id).await
}

/// Get a lead by ID.
pub async fn get_lead(pool: &SqlitePool, id: &str) -> Result<Lead> {
    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(id))
}

/// List leads, newest first.
pub async fn list_leads(pool: &SqlitePool, include_archived: bool) -> Result<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(
        r#"
        SELECT * FROM leads
        WHERE archived = 0 OR ?
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    Ok(leads)
}

/// Leads currently held by an agent.
pub async fn list_agent_leads(pool: &SqlitePool, agent_id: &str) -> Result<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(
        r#"
        SELECT * FROM leads
        WHERE assigned_agent_id = ? AND archived = 0
        ORDER BY assigned_at DESC
        "#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    Ok(leads)
}

/// Record that the assigned agent has reached the lead.
pub async fn mark_contacted(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<Lead> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET last_contact_at = ?, contact_complete = 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::lead_not_found(id));
    }

    get_lead(pool, id).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{LeadPriority, LeadSegment};
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    pub(crate) fn sample_lead(language: &str) -> NewLead {
        NewLead {
            first_name: "Marie".to_string(),
            last_name: "Curie".to_string(),
            phone_number: "600123456".to_string(),
            country_prefix: "+33".to_string(),
            email: Some("marie@example.com".to_string()),
            language: language.to_string(),
            lead_source: "Website".to_string(),
            lead_source_detail: None,
            page_type: Some("blog".to_string()),
            page_slug: Some("villas-marbella".to_string()),
            page_url: None,
            message: None,
            budget_range: Some("€1M-€2M".to_string()),
            location_preference: vec!["Marbella".to_string()],
            property_type: vec!["villa".to_string()],
            timeframe: Some("within_6_months".to_string()),
            lead_score: 72,
            lead_segment: LeadSegment::Warm,
            lead_priority: LeadPriority::Urgent,
        }
    }

    #[tokio::test]
    async fn test_lead_create_and_read() {
        let db = test_db().await;
        let now = Utc::now();

        let lead = create_lead(db.pool(), &sample_lead("fr"), now).await.unwrap();
        assert_eq!(lead.language, "fr");
        assert_eq!(lead.lead_segment, LeadSegment::Warm);
        assert_eq!(lead.lead_priority, LeadPriority::Urgent);
        assert_eq!(lead.property_type, vec!["villa"]);
        assert!(lead.assigned_agent_id.is_none());
        assert!(lead.assignment_method.is_none());
        assert!(!lead.lead_claimed && !lead.archived);

        let listed = list_leads(db.pool(), false).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            get_lead(db.pool(), "missing").await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_contacted() {
        let db = test_db().await;
        let now = Utc::now();
        let lead = create_lead(db.pool(), &sample_lead("en"), now).await.unwrap();

        let contacted = mark_contacted(db.pool(), &lead.id, now).await.unwrap();
        assert!(contacted.contact_complete);
        assert!(contacted.last_contact_at.is_some());
    }
}
