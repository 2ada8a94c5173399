//! Routing configuration loaded from environment variables.

use std::env;

use chrono::Duration;

use crate::error::{EngineError, Result};

/// Default claim window length in minutes.
pub const DEFAULT_CLAIM_WINDOW_MINUTES: i64 = 15;

/// Default age after which an uncontacted assignment breaches SLA.
pub const DEFAULT_SLA_BREACH_HOURS: i64 = 24;

/// Longest accepted claim window, one week.
pub const MAX_CLAIM_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted SLA threshold, ninety days.
pub const MAX_SLA_BREACH_HOURS: i64 = 90 * 24;

/// Default capacity of the post-commit notification queue.
pub const DEFAULT_QUEUE_SIZE: usize = 256;

/// Settings shared by the routing components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a broadcast lead stays open for claims.
    pub claim_window: Duration,
    /// Assigned leads with no contact after this long are SLA breaches.
    pub sla_breach_after: Duration,
    /// Base URL used to build claim and lead links.
    pub app_url: String,
    /// Language used when intake omits one.
    pub default_language: String,
    /// Capacity of the notification queue.
    pub queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            claim_window: Duration::minutes(DEFAULT_CLAIM_WINDOW_MINUTES),
            sla_breach_after: Duration::hours(DEFAULT_SLA_BREACH_HOURS),
            app_url: "http://127.0.0.1:8788".to_string(),
            default_language: "en".to_string(),
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `APP_URL` | Base URL for claim/lead links | `http://127.0.0.1:8788` |
    /// | `CLAIM_WINDOW_MINUTES` | Claim window length | `15` |
    /// | `SLA_BREACH_HOURS` | Hours before an uncontacted lead breaches SLA | `24` |
    /// | `DEFAULT_LEAD_LANGUAGE` | Language used when intake omits one | `en` |
    /// | `NOTIFICATION_QUEUE_SIZE` | Post-commit queue capacity | `256` |
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let claim_window_minutes = bounded(
            "CLAIM_WINDOW_MINUTES",
            parse_var("CLAIM_WINDOW_MINUTES", DEFAULT_CLAIM_WINDOW_MINUTES)?,
            MAX_CLAIM_WINDOW_MINUTES,
        )?;
        let sla_hours = bounded(
            "SLA_BREACH_HOURS",
            parse_var("SLA_BREACH_HOURS", DEFAULT_SLA_BREACH_HOURS)?,
            MAX_SLA_BREACH_HOURS,
        )?;

        let queue_size = parse_var("NOTIFICATION_QUEUE_SIZE", DEFAULT_QUEUE_SIZE)?;
        if queue_size == 0 {
            return Err(EngineError::Config(
                "NOTIFICATION_QUEUE_SIZE must be at least 1".to_string(),
            ));
        }

        let app_url = env::var("APP_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.app_url);

        let default_language = env::var("DEFAULT_LEAD_LANGUAGE")
            .map(|l| l.trim().to_lowercase())
            .unwrap_or(defaults.default_language);

        Ok(Self {
            claim_window: Duration::minutes(claim_window_minutes),
            sla_breach_after: Duration::hours(sla_hours),
            app_url,
            default_language,
            queue_size,
        })
    }

    /// Link an agent follows to claim a broadcast lead.
    pub fn claim_url(&self, lead_id: &str) -> String {
        format!("{}/crm/agent/leads/{}/claim", self.app_url, lead_id)
    }

    /// Link to a lead the agent already holds.
    pub fn lead_url(&self, lead_id: &str) -> String {
        format!("{}/crm/agent/leads/{}", self.app_url, lead_id)
    }
}

/// Positive and at most `max`. Larger durations overflow timestamp arithmetic.
fn bounded(name: &str, value: i64, max: i64) -> Result<i64> {
    if value <= 0 || value > max {
        return Err(EngineError::Config(format!(
            "{} must be between 1 and {}, got {}",
            name, max, value
        )));
    }
    Ok(value)
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::Config(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
