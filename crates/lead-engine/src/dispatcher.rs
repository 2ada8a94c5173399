//! Notification fan-out to agents over email, chat and the in-app inbox.
//!
//! Delivery failures are recorded per channel and logged. They never reach
//! the caller as errors and never touch assignment state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use database::notification::{self as inbox, LEAD_REASSIGNED, NEW_LEAD_AVAILABLE, RULE_ASSIGNED};
use database::{Agent, Database, Lead, NewNotification};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::render::{self, MessageKind};

/// A channel failed to deliver a message.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// An email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Outbound channels.
///
/// Abstracted so the engine can run against SMTP and a chat API in production
/// and against recorders in tests.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Send an email.
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError>;

    /// Post a chat message to a channel or user id.
    async fn send_chat(&self, target: &str, text: &str) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: NotificationTransport + ?Sized> NotificationTransport for Arc<T> {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        (**self).send_email(message).await
    }

    async fn send_chat(&self, target: &str, text: &str) -> Result<(), TransportError> {
        (**self).send_chat(target, text).await
    }
}

/// A transport that accepts and discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpTransport;

#[async_trait]
impl NotificationTransport for NoOpTransport {
    async fn send_email(&self, _message: &EmailMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_chat(&self, _target: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A transport that logs instead of sending.
#[derive(Debug, Clone, Default)]
pub struct LoggingTransport;

#[async_trait]
impl NotificationTransport for LoggingTransport {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        info!(to = %message.to, subject = %message.subject, "Email (not sent)");
        Ok(())
    }

    async fn send_chat(&self, target: &str, text: &str) -> Result<(), TransportError> {
        info!(target = %target, "Chat (not sent): {}", text);
        Ok(())
    }
}

/// A transport that keeps what it was asked to send. Either channel can be
/// switched to fail.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    emails: Mutex<Vec<EmailMessage>>,
    chats: Mutex<Vec<(String, String)>>,
    fail_email: AtomicBool,
    fail_chat: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_email(&self, fail: bool) {
        self.fail_email.store(fail, Ordering::SeqCst);
    }

    pub fn fail_chat(&self, fail: bool) {
        self.fail_chat.store(fail, Ordering::SeqCst);
    }

    /// Emails delivered so far.
    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `(target, text)` chat posts delivered so far.
    pub fn chats(&self) -> Vec<(String, String)> {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        if self.fail_email.load(Ordering::SeqCst) {
            return Err(TransportError("smtp unavailable".to_string()));
        }
        self.emails
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }

    async fn send_chat(&self, target: &str, text: &str) -> Result<(), TransportError> {
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(TransportError("chat unavailable".to_string()));
        }
        self.chats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}

/// Why agents are being told about a lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// Broadcast with an open claim window.
    Broadcast,
    /// Assigned directly by a routing rule.
    RuleAssigned { rule_name: String },
    /// Moved by an admin. The previous holder's inbox entries are closed.
    Reassigned { previous_agent_id: Option<String> },
}

/// A lead and the agents to notify about it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadNotice {
    pub lead: Lead,
    pub agents: Vec<Agent>,
    pub kind: NoticeKind,
}

/// What happened for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentDelivery {
    pub agent_id: String,
    /// `None` when the agent opted out of email.
    pub email: Option<bool>,
    pub chat_attempted: usize,
    pub chat_delivered: usize,
    pub in_app: bool,
}

/// Aggregate result of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub lead_id: String,
    pub agents: Vec<AgentDelivery>,
}

impl DeliveryReport {
    pub fn emails_sent(&self) -> usize {
        self.agents.iter().filter(|a| a.email == Some(true)).count()
    }

    pub fn emails_failed(&self) -> usize {
        self.agents.iter().filter(|a| a.email == Some(false)).count()
    }

    pub fn chat_sent(&self) -> usize {
        self.agents.iter().map(|a| a.chat_delivered).sum()
    }

    pub fn chat_failed(&self) -> usize {
        self.agents
            .iter()
            .map(|a| a.chat_attempted - a.chat_delivered)
            .sum()
    }
}

/// Sends lead notifications through a transport.
pub struct NotificationDispatcher<T: NotificationTransport> {
    transport: T,
    database: Database,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl<T: NotificationTransport> NotificationDispatcher<T> {
    pub fn new(transport: T, database: Database, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            database,
            config,
            clock,
        }
    }

    fn message_kind(&self, notice: &LeadNotice) -> MessageKind {
        match &notice.kind {
            NoticeKind::Broadcast => MessageKind::Claimable {
                expires_at: notice
                    .lead
                    .claim_window_expires_at
                    .unwrap_or_else(|| self.clock.now() + self.config.claim_window),
            },
            NoticeKind::RuleAssigned { rule_name } => MessageKind::RuleAssigned {
                rule_name: rule_name.clone(),
            },
            NoticeKind::Reassigned { .. } => MessageKind::Reassigned,
        }
    }

    fn notification_type(kind: &NoticeKind) -> &'static str {
        match kind {
            NoticeKind::Broadcast => NEW_LEAD_AVAILABLE,
            NoticeKind::RuleAssigned { .. } => RULE_ASSIGNED,
            NoticeKind::Reassigned { .. } => LEAD_REASSIGNED,
        }
    }

    /// Notify every agent in the notice. Each channel is attempted once.
    pub async fn notify(&self, notice: &LeadNotice) -> DeliveryReport {
        let lead = &notice.lead;
        let now = self.clock.now();
        let kind = self.message_kind(notice);
        let mut report = DeliveryReport {
            lead_id: lead.id.clone(),
            agents: Vec::with_capacity(notice.agents.len()),
        };

        if let NoticeKind::Reassigned {
            previous_agent_id: Some(previous),
        } = &notice.kind
        {
            if let Err(err) = inbox::mark_read_for_lead(self.database.pool(), previous, &lead.id, now).await {
                warn!(lead_id = %lead.id, agent_id = %previous, error = %err, "Failed to close previous agent's notifications");
            }
        }

        for agent in &notice.agents {
            let rendered = render::render(lead, &agent.first_name, &kind, &self.config, now);
            let mut delivery = AgentDelivery {
                agent_id: agent.id.clone(),
                ..Default::default()
            };

            let row = NewNotification {
                agent_id: agent.id.clone(),
                lead_id: Some(lead.id.clone()),
                notification_type: Self::notification_type(&notice.kind).to_string(),
                title: render::title(lead, &kind),
                message: Some(render::headline(lead)),
                action_url: Some(rendered.action_url.clone()),
            };
            match inbox::insert_notifications(self.database.pool(), &[row], now).await {
                Ok(_) => delivery.in_app = true,
                Err(err) => {
                    warn!(lead_id = %lead.id, agent_id = %agent.id, error = %err, "In-app notification failed");
                }
            }

            if agent.email_notifications {
                let email = EmailMessage {
                    to: agent.email.clone(),
                    subject: rendered.subject.clone(),
                    text: rendered.text.clone(),
                    html: rendered.html.clone(),
                };
                match self.transport.send_email(&email).await {
                    Ok(()) => {
                        delivery.email = Some(true);
                        debug!(lead_id = %lead.id, agent_id = %agent.id, "Email sent");
                    }
                    Err(err) => {
                        delivery.email = Some(false);
                        warn!(lead_id = %lead.id, agent_id = %agent.id, error = %err, "Email failed");
                    }
                }
            }

            if agent.chat_notifications {
                let targets = [agent.chat_channel_id.as_deref(), agent.chat_user_id.as_deref()];
                for target in targets.into_iter().flatten() {
                    delivery.chat_attempted += 1;
                    match self.transport.send_chat(target, &rendered.chat).await {
                        Ok(()) => delivery.chat_delivered += 1,
                        Err(err) => {
                            warn!(lead_id = %lead.id, agent_id = %agent.id, target = %target, error = %err, "Chat post failed");
                        }
                    }
                }
            }

            report.agents.push(delivery);
        }

        info!(
            lead_id = %lead.id,
            agents = report.agents.len(),
            emails_sent = report.emails_sent(),
            emails_failed = report.emails_failed(),
            chat_sent = report.chat_sent(),
            chat_failed = report.chat_failed(),
            "Lead notifications dispatched"
        );

        report
    }
}
