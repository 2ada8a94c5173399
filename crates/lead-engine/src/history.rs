//! Best-effort activity notes written after a transaction commits.

use chrono::{DateTime, Utc};
use database::{activity, Database};
use tracing::warn;

pub(crate) const ASSIGNMENT: &str = "assignment";
pub(crate) const CLAIM: &str = "claim";
pub(crate) const REASSIGNMENT: &str = "reassignment";
pub(crate) const RESTART: &str = "round_robin_restart";
pub(crate) const ARCHIVE: &str = "archive";
pub(crate) const UNARCHIVE: &str = "unarchive";
pub(crate) const CONTACT: &str = "contact";

/// Append a note. Failures are logged and swallowed.
pub(crate) async fn note(
    database: &Database,
    lead_id: &str,
    actor_id: Option<&str>,
    activity_type: &str,
    notes: &str,
    now: DateTime<Utc>,
) {
    if let Err(err) =
        activity::record_activity(database.pool(), lead_id, actor_id, activity_type, notes, now).await
    {
        warn!(lead_id = %lead_id, activity_type, error = %err, "Failed to record lead activity");
    }
}
