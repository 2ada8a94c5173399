use lettre::{
    message::{MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use crate::{Email, MailerError, SmtpConfig};

/// Pooled SMTP client.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a client over a STARTTLS relay.
    pub fn new(config: SmtpConfig) -> Result<Self, MailerError> {
        let creds = Credentials::new(config.username.clone(), config.password().to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailerError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            from = %config.from_address,
            "Created SMTP mailer"
        );

        Ok(Self {
            transport,
            from_address: config.from_address,
        })
    }

    /// Send an email.
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    pub async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let message = build_message(&self.from_address, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Send(e.to_string()))?;

        info!(to = %email.to, "Email sent");
        Ok(())
    }

    /// Check the connection to the relay.
    pub async fn test_connection(&self) -> Result<bool, MailerError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))
    }
}

fn build_message(from: &str, email: &Email) -> Result<Message, MailerError> {
    let from = from
        .parse()
        .map_err(|e| MailerError::InvalidAddress(format!("From: {}", e)))?;
    let to = email
        .to
        .parse()
        .map_err(|e| MailerError::InvalidAddress(format!("To '{}': {}", email.to, e)))?;

    let builder = Message::builder().from(from).to(to).subject(&email.subject);

    match &email.html_body {
        Some(html) => builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(email.body.clone()))
                    .singlepart(SinglePart::html(html.clone())),
            )
            .map_err(|e| MailerError::BuildEmail(e.to_string())),
        None => builder
            .body(email.body.clone())
            .map_err(|e| MailerError::BuildEmail(e.to_string())),
    }
}
