//! Error types for lead routing operations.

use database::{DatabaseError, ValidationError};
use thiserror::Error;

/// Errors that can occur while routing, claiming, or overriding leads.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced agent does not exist.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Referenced lead does not exist.
    #[error("lead not found: {0}")]
    LeadNotFound(String),

    /// Referenced routing rule does not exist.
    #[error("routing rule not found: {0}")]
    RuleNotFound(String),

    /// The agent cannot take the batch.
    #[error("agent {agent_id} has capacity for {available} more leads, {requested} requested")]
    CapacityExceeded {
        agent_id: String,
        requested: i64,
        available: i64,
    },

    /// The operation is not allowed from the lead's current state.
    #[error("cannot {operation} lead {lead_id} while it is {state}")]
    InvalidTransition {
        lead_id: String,
        state: String,
        operation: &'static str,
    },

    /// A record with the same key already exists.
    #[error("{0} already exists")]
    Duplicate(String),

    /// Bad configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage failure.
    #[error("storage error: {0}")]
    Database(#[source] DatabaseError),
}

impl From<DatabaseError> for EngineError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity: "Agent", id } => EngineError::AgentNotFound(id),
            DatabaseError::NotFound { entity: "Lead", id } => EngineError::LeadNotFound(id),
            DatabaseError::NotFound {
                entity: "RoutingRule",
                id,
            } => EngineError::RuleNotFound(id),
            DatabaseError::AlreadyExists { entity, id } => {
                EngineError::Duplicate(format!("{} {}", entity, id))
            }
            DatabaseError::CapacityExceeded {
                agent_id,
                requested,
                available,
            } => EngineError::CapacityExceeded {
                agent_id,
                requested,
                available,
            },
            DatabaseError::Conflict {
                entity: "Lead",
                id,
                reason,
            } => EngineError::InvalidTransition {
                lead_id: id,
                state: reason,
                operation: "update",
            },
            other => EngineError::Database(other),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
