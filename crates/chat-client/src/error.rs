//! Error types for chat-client.

use thiserror::Error;

/// Errors that can occur when talking to the chat API.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered `ok: false`.
    #[error("API error: {0}")]
    Api(String),

    /// Non-success HTTP status.
    #[error("Unexpected status {0}")]
    Status(u16),

    /// Missing required environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
