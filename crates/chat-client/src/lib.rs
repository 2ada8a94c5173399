//! Client for a chat workspace's bot API (`chat.postMessage` style).
//!
//! ```no_run
//! use chat_client::{ChatClient, ChatConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_client::ChatError> {
//!     let client = ChatClient::new(ChatConfig::from_env()?)?;
//!     client.post_message("C0123456", "New lead available").await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::{ChatClient, PostedMessage};
pub use config::ChatConfig;
pub use error::ChatError;
