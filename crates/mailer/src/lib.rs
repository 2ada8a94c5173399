//! # mailer
//!
//! SMTP client used to email agents about new and reassigned leads.
//!
//! ```no_run
//! use mailer::{Email, SmtpConfig, SmtpMailer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailer::MailerError> {
//!     let config = SmtpConfig::from_env()?;
//!     let mailer = SmtpMailer::new(config)?;
//!
//!     let email = Email::new("agent@example.com", "New lead", "A new lead is available.");
//!     mailer.send(&email).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::SmtpMailer;
pub use config::SmtpConfig;
pub use error::MailerError;
pub use types::Email;
