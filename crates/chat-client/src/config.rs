//! Configuration types for chat-client.

use std::env;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ChatError;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Configuration for the chat API.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the API, without a trailing slash.
    pub api_url: String,
    token: SecretString,
}

impl ChatConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: SecretString::from(token.into()),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `CHAT_BOT_TOKEN` - bot token
    ///
    /// Optional:
    /// - `CHAT_API_URL` - Default: https://slack.com/api
    pub fn from_env() -> Result<Self, ChatError> {
        let token = env::var("CHAT_BOT_TOKEN")
            .map_err(|_| ChatError::MissingEnvVar("CHAT_BOT_TOKEN".to_string()))?;
        let api_url = env::var("CHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(Self::new(api_url, token))
    }

    /// `Ok(None)` when `CHAT_BOT_TOKEN` is unset.
    pub fn from_env_optional() -> Result<Option<Self>, ChatError> {
        if env::var("CHAT_BOT_TOKEN").is_err() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }

    /// URL for an API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}
