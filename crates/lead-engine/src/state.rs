//! Lead assignment state derived from the stored columns.

use std::fmt;

use chrono::{DateTime, Utc};
use database::{AssignmentMethod, Lead};
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Where a lead is in its assignment lifecycle.
///
/// Storage keeps this as a handful of nullable columns; everything above the
/// storage layer goes through this type instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LeadState {
    /// No agent and no open window. New, unarchived, or unresolved leads.
    Unassigned,
    /// Waiting for an agent to claim it.
    BroadcastOpen { expires_at: DateTime<Utc> },
    /// Held by an agent.
    Claimed {
        agent_id: String,
        method: Option<AssignmentMethod>,
        assigned_at: Option<DateTime<Utc>>,
    },
    Archived,
}

/// Operations whose legality depends on the lead state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Route,
    Claim,
    Assign,
    Restart,
    Archive,
    Unarchive,
    Contact,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Route => "route",
            Operation::Claim => "claim",
            Operation::Assign => "assign",
            Operation::Restart => "restart",
            Operation::Archive => "archive",
            Operation::Unarchive => "unarchive",
            Operation::Contact => "record contact for",
        }
    }
}

impl LeadState {
    pub fn of(lead: &Lead) -> Self {
        if lead.archived {
            return LeadState::Archived;
        }
        match (&lead.assigned_agent_id, lead.claim_window_expires_at) {
            (Some(agent_id), _) if lead.lead_claimed => LeadState::Claimed {
                agent_id: agent_id.clone(),
                method: lead.assignment_method,
                assigned_at: lead.assigned_at,
            },
            (None, Some(expires_at)) => LeadState::BroadcastOpen { expires_at },
            _ => LeadState::Unassigned,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LeadState::Unassigned => "unassigned",
            LeadState::BroadcastOpen { .. } => "broadcast-open",
            LeadState::Claimed { .. } => "claimed",
            LeadState::Archived => "archived",
        }
    }

    /// A broadcast whose window has passed without a claim.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self, LeadState::BroadcastOpen { expires_at } if *expires_at <= now)
    }

    /// Name including the derived expired state.
    pub fn display_name(&self, now: DateTime<Utc>) -> &'static str {
        if self.is_expired(now) {
            "expired"
        } else {
            self.name()
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            LeadState::Claimed { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }

    /// Whether `op` may run from this state.
    pub fn allows(&self, op: Operation) -> bool {
        match (self, op) {
            (LeadState::Archived, Operation::Unarchive | Operation::Archive) => true,
            (LeadState::Archived, _) => false,
            (LeadState::Unassigned, Operation::Route) => true,
            (_, Operation::Route) => false,
            (LeadState::BroadcastOpen { .. }, Operation::Claim) => true,
            (_, Operation::Claim) => false,
            (_, Operation::Unarchive) => true,
            (LeadState::Claimed { .. }, Operation::Contact) => true,
            (_, Operation::Contact) => false,
            (_, Operation::Assign | Operation::Restart | Operation::Archive) => true,
        }
    }

    /// Reject `op` with [`EngineError::InvalidTransition`] if not allowed.
    pub fn check(&self, lead_id: &str, op: Operation) -> Result<()> {
        if self.allows(op) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                lead_id: lead_id.to_string(),
                state: self.name().to_string(),
                operation: op.as_str(),
            })
        }
    }
}

impl fmt::Display for LeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_transition_table() {
        let now = Utc::now();
        let open = LeadState::BroadcastOpen {
            expires_at: now + Duration::minutes(15),
        };
        let claimed = LeadState::Claimed {
            agent_id: "a1".to_string(),
            method: Some(AssignmentMethod::BroadcastClaimed),
            assigned_at: Some(now),
        };

        assert!(open.allows(Operation::Claim));
        assert!(!claimed.allows(Operation::Claim));
        assert!(!LeadState::Unassigned.allows(Operation::Claim));
        assert!(!LeadState::Archived.allows(Operation::Claim));

        assert!(LeadState::Unassigned.allows(Operation::Route));
        assert!(!open.allows(Operation::Route));
        assert!(!LeadState::Archived.allows(Operation::Restart));
        assert!(!LeadState::Archived.allows(Operation::Assign));
        assert!(LeadState::Archived.allows(Operation::Unarchive));
        assert!(claimed.allows(Operation::Restart));
        assert!(claimed.allows(Operation::Contact));
        assert!(!open.allows(Operation::Contact));
    }

    #[test]
    fn test_expiry_is_derived() {
        let now = Utc::now();
        let open = LeadState::BroadcastOpen {
            expires_at: now - Duration::seconds(1),
        };
        assert!(open.is_expired(now));
        assert_eq!(open.display_name(now), "expired");
        assert_eq!(open.name(), "broadcast-open");

        let err = LeadState::Archived.check("l1", Operation::Claim).unwrap_err();
        assert_eq!(err.to_string(), "cannot claim lead l1 while it is archived");
    }
}
