//! Delivery of lead notifications over email and chat.
//!
//! [`Broadcaster`] is the production [`NotificationTransport`]: it holds an
//! optional SMTP mailer and an optional chat client and routes each message to
//! the right one.
//!
//! # Example
//!
//! ```no_run
//! use broadcaster::Broadcaster;
//! use lead_engine::{EmailMessage, NotificationTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broadcaster = Broadcaster::from_env()?;
//!
//! let email = EmailMessage {
//!     to: "agent@example.com".to_string(),
//!     subject: "New lead".to_string(),
//!     text: "A new lead is available.".to_string(),
//!     html: "<p>A new lead is available.</p>".to_string(),
//! };
//! broadcaster.send_email(&email).await?;
//! broadcaster.send_chat("C0123456", "New lead available").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chat_client::{ChatClient, ChatConfig, ChatError};
use lead_engine::{EmailMessage, NotificationTransport, TransportError};
use mailer::{Email, MailerError, SmtpConfig, SmtpMailer};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while setting up delivery.
#[derive(Debug, Error)]
pub enum Error {
    /// SMTP setup error.
    #[error("Mailer error: {0}")]
    Mailer(#[from] MailerError),

    /// Chat client setup error.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Sends rendered notifications through whichever channels are configured.
#[derive(Clone, Default)]
pub struct Broadcaster {
    mailer: Option<std::sync::Arc<SmtpMailer>>,
    chat: Option<ChatClient>,
}

impl Broadcaster {
    pub fn new(mailer: Option<SmtpMailer>, chat: Option<ChatClient>) -> Self {
        Self {
            mailer: mailer.map(std::sync::Arc::new),
            chat,
        }
    }

    /// Build from `SMTP_*` and `CHAT_*` variables. A channel whose credentials
    /// are absent is left disabled.
    pub fn from_env() -> Result<Self, Error> {
        let mailer = SmtpConfig::from_env_optional()?
            .map(SmtpMailer::new)
            .transpose()?;
        let chat = ChatConfig::from_env_optional()?
            .map(ChatClient::new)
            .transpose()?;

        info!(
            email = mailer.is_some(),
            chat = chat.is_some(),
            "Broadcaster configured"
        );
        Ok(Self::new(mailer, chat))
    }

    pub fn email_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    pub fn chat_enabled(&self) -> bool {
        self.chat.is_some()
    }
}

#[async_trait]
impl NotificationTransport for Broadcaster {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let Some(mailer) = &self.mailer else {
            debug!(to = %message.to, "Email channel not configured");
            return Err(TransportError("email channel not configured".to_string()));
        };
        let email = Email::new(&message.to, &message.subject, &message.text).with_html(&message.html);
        mailer
            .send(&email)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn send_chat(&self, target: &str, text: &str) -> Result<(), TransportError> {
        let Some(chat) = &self.chat else {
            debug!(target = %target, "Chat channel not configured");
            return Err(TransportError("chat channel not configured".to_string()));
        };
        chat.post_message(target, text)
            .await
            .map(|_| ())
            .map_err(|e| TransportError(e.to_string()))
    }
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> EmailMessage {
        EmailMessage {
            to: "agent@example.com".to_string(),
            subject: "New lead".to_string(),
            text: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_channels_fail_softly() {
        let broadcaster = Broadcaster::default();
        assert!(!broadcaster.email_enabled());
        assert!(!broadcaster.chat_enabled());

        let err = broadcaster.send_email(&email()).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert!(broadcaster.send_chat("C1", "hi").await.is_err());
    }

    #[tokio::test]
    async fn test_chat_failure_maps_to_transport_error() {
        let chat = ChatClient::new(ChatConfig::new("http://127.0.0.1:9", "token")).unwrap();
        let broadcaster = Broadcaster::new(None, Some(chat));
        assert!(broadcaster.chat_enabled());

        let err = broadcaster.send_chat("C1", "hi").await.unwrap_err();
        assert!(err.to_string().contains("HTTP error"));
    }

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
