//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// The record exists but is not in a state that allows the write.
    #[error("{entity} {id} is {reason}")]
    Conflict {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// The agent cannot take the requested number of leads.
    #[error("agent {agent_id} has capacity for {available} more leads, {requested} requested")]
    CapacityExceeded {
        agent_id: String,
        requested: i64,
        available: i64,
    },
}

impl DatabaseError {
    pub(crate) fn lead_not_found(id: &str) -> Self {
        DatabaseError::NotFound {
            entity: "Lead",
            id: id.to_string(),
        }
    }

    pub(crate) fn agent_not_found(id: &str) -> Self {
        DatabaseError::NotFound {
            entity: "Agent",
            id: id.to_string(),
        }
    }

    pub(crate) fn lead_conflict(id: &str, reason: impl Into<String>) -> Self {
        DatabaseError::Conflict {
            entity: "Lead",
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
