//! Lead routing for the CRM.
//!
//! Inbound leads are matched against prioritized routing rules and either
//! assigned straight to the rule's agent or broadcast to every eligible agent
//! with a claim window. Agents race to claim; admins can reassign, restart,
//! archive and re-route. Capacity bookkeeping happens in the same storage
//! transaction as each lead write (see [`database::assignment`]); this crate
//! decides what to write and fans out notifications after commit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use lead_engine::{EngineConfig, LeadIntake, LeadRouter, LoggingTransport, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:leads.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let (router, _worker) = LeadRouter::start(
//!         db,
//!         Arc::new(SystemClock),
//!         EngineConfig::from_env()?,
//!         LoggingTransport,
//!     );
//!
//!     let intake = LeadIntake {
//!         first_name: "Marie".to_string(),
//!         last_name: "Curie".to_string(),
//!         phone: "600000000".to_string(),
//!         language: Some("fr".to_string()),
//!         ..Default::default()
//!     };
//!     let routed = router.engine.intake(intake).await?;
//!     println!("{} -> {}", routed.lead.id, routed.result.label());
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod claim;
pub mod clock;
pub mod config;
pub mod criteria;
pub mod dispatcher;
pub mod engine;
pub mod error;
mod history;
pub mod intake;
pub mod queue;
pub mod registry;
pub mod render;
pub mod reports;
pub mod rules;
pub mod scoring;
pub mod state;

pub use admin::{AdminOverrides, BulkAssignment, ReassignReason};
pub use claim::{ClaimResult, ClaimTracker, IneligibleReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use criteria::{Criteria, LeadSnapshot};
pub use dispatcher::{
    DeliveryReport, EmailMessage, LeadNotice, LoggingTransport, NoOpTransport,
    NotificationDispatcher, NotificationTransport, NoticeKind, RecordingTransport, TransportError,
};
pub use engine::{AssignmentEngine, AssignmentResult, Routed};
pub use error::{EngineError, Result};
pub use intake::LeadIntake;
pub use queue::{DiscardSink, DispatchQueue, NotificationSink, RecordingSink};
pub use registry::AgentRegistry;
pub use reports::{LeadFilter, LeadStatus, LeadView, QueueReports, QueueStats};
pub use rules::{RuleOutcome, RuleSet};
pub use state::{LeadState, Operation};

use std::sync::Arc;

use database::Database;
use tokio::task::JoinHandle;

/// Every routing component built over one database, clock and sink.
#[derive(Clone)]
pub struct LeadRouter {
    pub registry: AgentRegistry,
    pub engine: AssignmentEngine,
    pub claims: ClaimTracker,
    pub admin: AdminOverrides,
    pub reports: QueueReports,
}

impl LeadRouter {
    /// Build the components around an existing notification sink.
    pub fn new(
        database: Database,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let engine = AssignmentEngine::new(database.clone(), clock.clone(), config.clone(), sink.clone());
        Self {
            registry: AgentRegistry::new(database.clone(), clock.clone()),
            claims: ClaimTracker::new(database.clone(), clock.clone()),
            admin: AdminOverrides::new(
                database.clone(),
                clock.clone(),
                config.clone(),
                engine.clone(),
                sink,
            ),
            reports: QueueReports::new(database, clock, config),
            engine,
        }
    }

    /// Start a [`DispatchQueue`] over `transport` and build the components
    /// around it. Must be called inside a Tokio runtime.
    pub fn start<T>(
        database: Database,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        transport: T,
    ) -> (Self, JoinHandle<()>)
    where
        T: NotificationTransport + 'static,
    {
        let dispatcher =
            NotificationDispatcher::new(transport, database.clone(), config.clone(), clock.clone());
        let (queue, worker) = DispatchQueue::start(dispatcher, config.queue_size);
        (Self::new(database, clock, config, Arc::new(queue)), worker)
    }
}
