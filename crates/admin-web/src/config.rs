//! Server settings read from the environment.

use std::env;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "127.0.0.1:8788";
const DEFAULT_DATABASE_URL: &str = "sqlite:leads.db?mode=rwc";

/// Where the admin server listens and which database it opens.
///
/// | Variable | Description | Default |
/// |----------|-------------|---------|
/// | `ADMIN_ADDR` | Server bind address | `127.0.0.1:8788` |
/// | `SQLITE_PATH` | SQLite database URL | `sqlite:leads.db?mode=rwc` |
///
/// Routing settings are read by `EngineConfig::from_env` and delivery
/// settings by `Broadcaster::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            env::var("ADMIN_ADDR").ok().as_deref(),
            env::var("SQLITE_PATH").ok(),
        )
    }

    fn from_values(addr: Option<&str>, database_url: Option<String>) -> Result<Self, ConfigError> {
        let raw = addr.unwrap_or(DEFAULT_ADDR);
        let addr = raw
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(raw.to_string()))?;

        Ok(Self {
            addr,
            database_url: database_url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ADMIN_ADDR: {0}")]
    InvalidAddr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_values(None, None).unwrap();
        assert_eq!(config.addr.port(), 8788);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_bad_addr_reported() {
        let err = Config::from_values(Some("localhost"), None).unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }
}
