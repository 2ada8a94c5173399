//! SQLite persistence layer for the lead routing CRM.
//!
//! This crate provides async database operations for agents, routing rules,
//! leads and their history using SQLx with SQLite. Writes that change which
//! agent holds a lead live in [`assignment`] and keep agent capacity counts in
//! the same transaction.
//!
//! # Example
//!
//! ```no_run
//! use database::{agent, Database, NewAgent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:leads.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Register an agent
//!     let new = NewAgent {
//!         first_name: "Ana".to_string(),
//!         last_name: "Lopez".to_string(),
//!         email: "ana@example.com".to_string(),
//!         languages: vec!["es".to_string(), "en".to_string()],
//!         chat_channel_id: None,
//!         chat_user_id: None,
//!         email_notifications: true,
//!         chat_notifications: false,
//!         max_active_leads: 10,
//!     };
//!     agent::create_agent(db.pool(), &new, chrono::Utc::now()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod agent;
pub mod assignment;
pub mod error;
pub mod lead;
pub mod models;
pub mod notification;
pub mod reassignment;
pub mod routing_rule;
pub mod validation;

pub use assignment::{AdminAssignment, ClaimOutcome, MovedLead, ReleasedLead, UnarchivedLead};
pub use error::{DatabaseError, Result};
pub use models::{
    Agent, AssignmentMethod, ClaimableLead, Lead, LeadActivity, LeadNotification, LeadPriority,
    LeadReassignment, LeadSegment, NewAgent, NewLead, NewNotification, NewRoutingRule,
    RoutingRule,
};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Sized for concurrent claim and admin requests.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/leads.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check that a connection can run a query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
