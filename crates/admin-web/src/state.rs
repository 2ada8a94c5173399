//! Application state shared across handlers.

use database::Database;
use lead_engine::LeadRouter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection, for read-only history queries.
    pub db: Database,
    /// Routing components.
    pub leads: LeadRouter,
    /// Which delivery channels are configured.
    pub channels: Channels,
}

/// Delivery channel availability, shown on the dashboard and health check.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Channels {
    pub email: bool,
    pub chat: bool,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, leads: LeadRouter, channels: Channels) -> Self {
        Self {
            db,
            leads,
            channels,
        }
    }
}
