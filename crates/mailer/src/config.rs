use secrecy::{ExposeSecret, SecretString};
use std::env;

use crate::MailerError;

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP host (default: 127.0.0.1)
    pub smtp_host: String,
    /// SMTP port (default: 587)
    pub smtp_port: u16,
    pub username: String,
    password: SecretString,
    /// Sender address (default: the username)
    pub from_address: String,
}

impl SmtpConfig {
    /// Create a new configuration with explicit values.
    pub fn new(
        smtp_host: impl Into<String>,
        smtp_port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
            from_address: username.clone(),
            username,
            password: SecretString::from(password.into()),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SMTP_USERNAME` - SMTP login
    /// - `SMTP_PASSWORD` - SMTP password
    ///
    /// Optional (with defaults):
    /// - `SMTP_HOST` - Default: 127.0.0.1
    /// - `SMTP_PORT` - Default: 587
    /// - `SMTP_FROM` - Default: `SMTP_USERNAME`
    pub fn from_env() -> Result<Self, MailerError> {
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|e| MailerError::Config(format!("Invalid SMTP_PORT: {}", e)))?;

        let username =
            env::var("SMTP_USERNAME").map_err(|_| MailerError::MissingEnvVar("SMTP_USERNAME".to_string()))?;

        let password =
            env::var("SMTP_PASSWORD").map_err(|_| MailerError::MissingEnvVar("SMTP_PASSWORD".to_string()))?;

        let from_address = env::var("SMTP_FROM").unwrap_or_else(|_| username.clone());

        Ok(Self {
            smtp_host,
            smtp_port,
            username,
            password: SecretString::from(password),
            from_address,
        })
    }

    /// Like [`from_env`](Self::from_env), but `Ok(None)` when `SMTP_USERNAME`
    /// is unset so email can be left switched off.
    pub fn from_env_optional() -> Result<Option<Self>, MailerError> {
        if env::var("SMTP_USERNAME").is_err() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Builder method to set the sender address.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }
}
