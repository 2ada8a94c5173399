//! Chat API HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    unfurl_links: bool,
}

/// Envelope every API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    channel: Option<String>,
    ts: Option<String>,
}

/// Where a message landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: Option<String>,
}

/// Client for the chat API.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ChatError::Http)?;
        info!(api_url = %config.api_url, "Created chat client");
        Ok(Self { http, config })
    }

    /// Post `text` to a channel or a user's direct messages.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ChatError> {
        let body = PostMessageRequest {
            channel,
            text,
            unfurl_links: false,
        };
        let resp = self.call("chat.postMessage", &body).await?;
        debug!(channel = %channel, "Chat message posted");
        Ok(PostedMessage {
            channel: resp.channel.unwrap_or_else(|| channel.to_string()),
            ts: resp.ts,
        })
    }

    /// Verify the token against the API.
    pub async fn auth_test(&self) -> Result<bool, ChatError> {
        match self.call("auth.test", &serde_json::json!({})).await {
            Ok(_) => Ok(true),
            Err(ChatError::Api(reason)) => {
                warn!(reason = %reason, "Chat token rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<ApiResponse, ChatError> {
        let url = self.config.method_url(method);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.config.token())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        let text = resp.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&text)?;
        if !parsed.ok {
            return Err(ChatError::Api(
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(parsed)
    }
}
