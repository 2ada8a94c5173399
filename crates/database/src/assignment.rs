//! Transactional writes that move leads between agents.
//!
//! Every operation here changes `assigned_agent_id` and the matching agent's
//! `current_lead_count` in one transaction, using server-side deltas. Each
//! transaction opens with a write so SQLite takes the write lock before any
//! row is read.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{AssignmentMethod, Lead};

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The agent now holds the lead.
    Claimed(Lead),
    /// Someone else got there first.
    AlreadyClaimed,
    /// No claim window was ever opened for this lead.
    WindowNotOpen,
    /// The claim window has closed; only a restart reopens it.
    WindowExpired,
    /// The lead is archived.
    Archived,
    /// The agent is inactive, paused, full, or does not speak the language.
    AgentNotEligible,
}

/// A lead written by [`admin_assign`].
#[derive(Debug, Clone, PartialEq)]
pub struct MovedLead {
    pub lead: Lead,
    /// Agent that held the lead before the move.
    pub previous_agent_id: Option<String>,
    /// False when the target already held the lead.
    pub moved: bool,
}

/// Parameters for a manual or bulk assignment.
#[derive(Debug, Clone)]
pub struct AdminAssignment<'a> {
    pub lead_ids: &'a [String],
    pub agent_id: &'a str,
    pub method: AssignmentMethod,
    pub reassigned_by: &'a str,
    /// `unclaimed`, `no_contact` or `manual`.
    pub reason: &'a str,
    pub notes: Option<&'a str>,
}

/// A lead after an operation that may have freed an agent slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasedLead {
    pub lead: Lead,
    pub released_agent_id: Option<String>,
    /// False when the call found nothing to change.
    pub changed: bool,
}

/// Result of clearing the archived flag.
#[derive(Debug, Clone, PartialEq)]
pub struct UnarchivedLead {
    pub lead: Lead,
    /// False when the lead was not archived.
    pub changed: bool,
}

async fn fetch_lead(conn: &mut SqliteConnection, id: &str) -> Result<Option<Lead>> {
    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(lead)
}

async fn touch_lead(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE leads SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::lead_not_found(id));
    }
    Ok(())
}

async fn touch_agent(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE agents SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::agent_not_found(id));
    }
    Ok(())
}

/// Take one slot from an agent that is active, accepting, under capacity, and
/// speaks `language`. Returns false if any condition fails.
async fn reserve_eligible(
    conn: &mut SqliteConnection,
    agent_id: &str,
    language: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE agents
        SET current_lead_count = current_lead_count + 1, updated_at = ?
        WHERE id = ?
          AND is_active = 1
          AND accepts_new_leads = 1
          AND current_lead_count < max_active_leads
          AND EXISTS (SELECT 1 FROM json_each(agents.languages) WHERE value = ?)
        "#,
    )
    .bind(now)
    .bind(agent_id)
    .bind(language)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Take `count` slots from an agent, checking capacity only.
async fn reserve_capacity(
    conn: &mut SqliteConnection,
    agent_id: &str,
    count: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE agents
        SET current_lead_count = current_lead_count + ?, updated_at = ?
        WHERE id = ? AND current_lead_count + ? <= max_active_leads
        "#,
    )
    .bind(count)
    .bind(now)
    .bind(agent_id)
    .bind(count)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn release(
    conn: &mut SqliteConnection,
    agent_id: &str,
    count: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE agents
        SET current_lead_count = MAX(current_lead_count - ?, 0), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(count)
    .bind(now)
    .bind(agent_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// The agent whose capacity a lead occupies, if any.
fn holder(lead: &Lead) -> Option<&str> {
    if lead.archived || !lead.lead_claimed {
        return None;
    }
    lead.assigned_agent_id.as_deref()
}

fn classify_unassignable(lead: Option<Lead>, id: &str) -> DatabaseError {
    match lead {
        None => DatabaseError::lead_not_found(id),
        Some(l) if l.archived => DatabaseError::lead_conflict(id, "archived"),
        Some(_) => DatabaseError::lead_conflict(id, "assigned"),
    }
}

/// Assign an unassigned lead straight to `agent_id` on behalf of a routing rule.
///
/// Returns `Ok(None)` and changes nothing when the agent cannot take the lead.
pub async fn assign_direct(
    pool: &SqlitePool,
    lead_id: &str,
    agent_id: &str,
    rule_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<Lead>> {
    let mut tx = pool.begin().await?;

    let touched = sqlx::query(
        r#"
        UPDATE leads SET updated_at = ?
        WHERE id = ? AND archived = 0 AND lead_claimed = 0 AND assigned_agent_id IS NULL
        "#,
    )
    .bind(now)
    .bind(lead_id)
    .execute(&mut *tx)
    .await?;
    if touched.rows_affected() == 0 {
        let lead = fetch_lead(&mut tx, lead_id).await?;
        return Err(classify_unassignable(lead, lead_id));
    }

    let language: String = sqlx::query_scalar("SELECT language FROM leads WHERE id = ?")
        .bind(lead_id)
        .fetch_one(&mut *tx)
        .await?;

    if !reserve_eligible(&mut tx, agent_id, &language, now).await? {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query(
        r#"
        UPDATE leads
        SET assigned_agent_id = ?, assigned_at = ?, assignment_method = ?, lead_claimed = 1,
            claim_window_expires_at = NULL, routing_rule_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(agent_id)
    .bind(now)
    .bind(AssignmentMethod::RuleMatched)
    .bind(rule_id)
    .bind(now)
    .bind(lead_id)
    .execute(&mut *tx)
    .await?;

    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    tx.commit().await?;

    tracing::debug!(lead_id = %lead_id, agent_id = %agent_id, "Lead assigned directly");
    Ok(Some(lead))
}

/// Open a claim window on an unassigned lead.
pub async fn open_claim_window(
    pool: &SqlitePool,
    lead_id: &str,
    rule_id: Option<&str>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Lead> {
    let mut conn = pool.acquire().await?;

    let result = sqlx::query(
        r#"
        UPDATE leads
        SET claim_window_expires_at = ?, assignment_method = NULL, assigned_at = NULL,
            routing_rule_id = COALESCE(?, routing_rule_id), updated_at = ?
        WHERE id = ? AND archived = 0 AND lead_claimed = 0 AND assigned_agent_id IS NULL
        "#,
    )
    .bind(expires_at)
    .bind(rule_id)
    .bind(now)
    .bind(lead_id)
    .execute(&mut *conn)
    .await?;

    let lead = fetch_lead(&mut conn, lead_id).await?;
    if result.rows_affected() == 0 {
        return Err(classify_unassignable(lead, lead_id));
    }
    lead.ok_or_else(|| DatabaseError::lead_not_found(lead_id))
}

/// Claim a broadcast lead for `agent_id`. Exactly one concurrent caller wins,
/// and only while the window is open at `now`.
pub async fn claim_lead(
    pool: &SqlitePool,
    lead_id: &str,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome> {
    let mut tx = pool.begin().await?;

    touch_agent(&mut tx, agent_id, now).await?;

    let claimed = sqlx::query(
        r#"
        UPDATE leads
        SET assigned_agent_id = ?, assigned_at = ?, assignment_method = ?, lead_claimed = 1,
            claim_window_expires_at = NULL, updated_at = ?
        WHERE id = ?
          AND archived = 0
          AND lead_claimed = 0
          AND assigned_agent_id IS NULL
          AND claim_window_expires_at > ?
        "#,
    )
    .bind(agent_id)
    .bind(now)
    .bind(AssignmentMethod::BroadcastClaimed)
    .bind(now)
    .bind(lead_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        let lead = fetch_lead(&mut tx, lead_id).await?;
        tx.rollback().await?;
        return match lead {
            None => Err(DatabaseError::lead_not_found(lead_id)),
            Some(l) if l.archived => Ok(ClaimOutcome::Archived),
            Some(l) if l.lead_claimed || l.assigned_agent_id.is_some() => {
                Ok(ClaimOutcome::AlreadyClaimed)
            }
            Some(l) if l.claim_window_expires_at.is_some() => Ok(ClaimOutcome::WindowExpired),
            Some(_) => Ok(ClaimOutcome::WindowNotOpen),
        };
    }

    let language: String = sqlx::query_scalar("SELECT language FROM leads WHERE id = ?")
        .bind(lead_id)
        .fetch_one(&mut *tx)
        .await?;

    if !reserve_eligible(&mut tx, agent_id, &language, now).await? {
        tx.rollback().await?;
        return Ok(ClaimOutcome::AgentNotEligible);
    }

    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    tx.commit().await?;

    Ok(ClaimOutcome::Claimed(lead))
}

/// Move one or more leads to an agent on behalf of an admin.
///
/// All-or-nothing: an unknown agent, a missing or archived lead, or too little
/// capacity rejects the whole batch before anything is written. Previous
/// holders are released, the target is charged for the leads it did not
/// already hold.
pub async fn admin_assign(
    pool: &SqlitePool,
    request: &AdminAssignment<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<MovedLead>> {
    let agent_id = request.agent_id;
    let mut tx = pool.begin().await?;

    touch_agent(&mut tx, agent_id, now).await?;

    let mut seen = HashSet::new();
    let mut leads = Vec::new();
    for id in request.lead_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let lead = fetch_lead(&mut tx, id)
            .await?
            .ok_or_else(|| DatabaseError::lead_not_found(id))?;
        if lead.archived {
            return Err(DatabaseError::lead_conflict(id, "archived"));
        }
        leads.push(lead);
    }

    let (max, current): (i64, i64) =
        sqlx::query_as("SELECT max_active_leads, current_lead_count FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_one(&mut *tx)
            .await?;

    let needed = leads.iter().filter(|l| holder(l) != Some(agent_id)).count() as i64;
    let available = (max - current).max(0);
    if needed > available {
        return Err(DatabaseError::CapacityExceeded {
            agent_id: agent_id.to_string(),
            requested: needed,
            available,
        });
    }

    let mut released: BTreeMap<&str, i64> = BTreeMap::new();
    for lead in &leads {
        if let Some(prev) = holder(lead) {
            if prev != agent_id {
                *released.entry(prev).or_default() += 1;
            }
        }
    }
    for (prev, count) in &released {
        release(&mut tx, prev, *count, now).await?;
    }

    if needed > 0 && !reserve_capacity(&mut tx, agent_id, needed, now).await? {
        return Err(DatabaseError::CapacityExceeded {
            agent_id: agent_id.to_string(),
            requested: needed,
            available,
        });
    }

    let mut moved = Vec::with_capacity(leads.len());
    for lead in &leads {
        let previous = lead.assigned_agent_id.clone();
        if holder(lead) == Some(agent_id) {
            moved.push(MovedLead {
                lead: lead.clone(),
                previous_agent_id: previous,
                moved: false,
            });
            continue;
        }

        sqlx::query(
            r#"
            UPDATE leads
            SET assigned_agent_id = ?,
                assigned_at = ?,
                assignment_method = ?,
                lead_claimed = 1,
                claim_window_expires_at = NULL,
                previous_agent_id = COALESCE(assigned_agent_id, previous_agent_id),
                reassignment_count = reassignment_count
                    + CASE WHEN assigned_agent_id IS NULL THEN 0 ELSE 1 END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(agent_id)
        .bind(now)
        .bind(request.method)
        .bind(now)
        .bind(&lead.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO lead_reassignments (
                lead_id, from_agent_id, to_agent_id, reassigned_by, reason, notes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lead.id)
        .bind(&previous)
        .bind(agent_id)
        .bind(request.reassigned_by)
        .bind(request.reason)
        .bind(request.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_lead(&mut tx, &lead.id)
            .await?
            .ok_or_else(|| DatabaseError::lead_not_found(&lead.id))?;
        moved.push(MovedLead {
            lead: updated,
            previous_agent_id: previous,
            moved: true,
        });
    }

    tx.commit().await?;

    tracing::info!(
        agent_id = %agent_id,
        method = %request.method,
        requested = leads.len(),
        charged = needed,
        "Admin assignment committed"
    );
    Ok(moved)
}

/// Archive a lead, freeing its agent's slot. Archiving twice is a no-op.
///
/// The assignment is cleared (the former holder is kept in
/// `previous_agent_id`), so unarchiving never brings back a stale charge.
pub async fn archive_lead(pool: &SqlitePool, lead_id: &str, now: DateTime<Utc>) -> Result<ReleasedLead> {
    let mut tx = pool.begin().await?;

    touch_lead(&mut tx, lead_id, now).await?;
    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;

    if lead.archived {
        tx.rollback().await?;
        return Ok(ReleasedLead {
            lead,
            released_agent_id: None,
            changed: false,
        });
    }

    let released = holder(&lead).map(str::to_string);
    if let Some(agent_id) = &released {
        release(&mut tx, agent_id, 1, now).await?;
    }

    sqlx::query(
        r#"
        UPDATE leads
        SET archived = 1,
            archived_at = ?,
            previous_agent_id = COALESCE(assigned_agent_id, previous_agent_id),
            assigned_agent_id = NULL,
            assigned_at = NULL,
            assignment_method = NULL,
            lead_claimed = 0,
            claim_window_expires_at = NULL,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(lead_id)
    .execute(&mut *tx)
    .await?;

    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    tx.commit().await?;

    Ok(ReleasedLead {
        lead,
        released_agent_id: released,
        changed: true,
    })
}

/// Clear the archived flag. Assignment is not restored; the lead stays
/// unassigned until routed again.
pub async fn unarchive_lead(
    pool: &SqlitePool,
    lead_id: &str,
    now: DateTime<Utc>,
) -> Result<UnarchivedLead> {
    let mut conn = pool.acquire().await?;

    let result = sqlx::query(
        r#"
        UPDATE leads
        SET archived = 0, archived_at = NULL, updated_at = ?
        WHERE id = ? AND archived = 1
        "#,
    )
    .bind(now)
    .bind(lead_id)
    .execute(&mut *conn)
    .await?;

    let lead = fetch_lead(&mut conn, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    Ok(UnarchivedLead {
        lead,
        changed: result.rows_affected() > 0,
    })
}

/// Release the holder (if any), reset the lead to unassigned, and open a new
/// claim window ending at `expires_at`.
///
/// Repeating the call never releases a slot twice.
pub async fn restart_round_robin(
    pool: &SqlitePool,
    lead_id: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<ReleasedLead> {
    let mut tx = pool.begin().await?;

    touch_lead(&mut tx, lead_id, now).await?;
    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    if lead.archived {
        return Err(DatabaseError::lead_conflict(lead_id, "archived"));
    }

    let released = holder(&lead).map(str::to_string);
    if let Some(agent_id) = &released {
        release(&mut tx, agent_id, 1, now).await?;
    }

    sqlx::query(
        r#"
        UPDATE leads
        SET previous_agent_id = COALESCE(assigned_agent_id, previous_agent_id),
            assigned_agent_id = NULL,
            assigned_at = NULL,
            assignment_method = NULL,
            lead_claimed = 0,
            claim_window_expires_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(expires_at)
    .bind(now)
    .bind(lead_id)
    .execute(&mut *tx)
    .await?;

    let lead = fetch_lead(&mut tx, lead_id)
        .await?
        .ok_or_else(|| DatabaseError::lead_not_found(lead_id))?;
    tx.commit().await?;

    Ok(ReleasedLead {
        lead,
        released_agent_id: released,
        changed: true,
    })
}
