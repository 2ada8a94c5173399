//! Email and chat text for lead notifications.

use std::fmt::Write;

use askama_escape::{escape, Html};
use chrono::{DateTime, Utc};
use database::Lead;

use crate::config::EngineConfig;

/// Flag shown in subjects for the languages the agency works in.
pub fn language_flag(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "fr" => "🇫🇷",
        "fi" => "🇫🇮",
        "pl" => "🇵🇱",
        "en" => "🇬🇧",
        "nl" => "🇳🇱",
        "de" => "🇩🇪",
        "es" => "🇪🇸",
        "sv" => "🇸🇪",
        "da" => "🇩🇰",
        "hu" => "🇭🇺",
        _ => "🌍",
    }
}

/// How the message should frame the lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Open for claims until the given time.
    Claimable { expires_at: DateTime<Utc> },
    /// Assigned by a routing rule.
    RuleAssigned { rule_name: String },
    /// Moved to the agent by an admin.
    Reassigned,
}

/// Rendered content for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub chat: String,
    /// Link the agent should follow.
    pub action_url: String,
}

struct Summary {
    name: String,
    segment: String,
    budget: String,
    locations: String,
    timeframe: String,
    source: String,
}

impl Summary {
    fn of(lead: &Lead) -> Self {
        Self {
            name: lead.full_name(),
            segment: lead.lead_segment.to_string(),
            budget: lead.budget_range.clone().unwrap_or_else(|| "Budget TBD".to_string()),
            locations: if lead.location_preference.is_empty() {
                "Any".to_string()
            } else {
                lead.location_preference.join(", ")
            },
            timeframe: lead
                .timeframe
                .as_deref()
                .map(|t| t.replace('_', " "))
                .unwrap_or_else(|| "Not specified".to_string()),
            source: lead.lead_source.clone(),
        }
    }

    fn rows(&self) -> [(&'static str, &str); 5] {
        [
            ("Segment", self.segment.as_str()),
            ("Budget", self.budget.as_str()),
            ("Locations", self.locations.as_str()),
            ("Timeframe", self.timeframe.as_str()),
            ("Source", self.source.as_str()),
        ]
    }
}

/// Short title used for in-app notifications and the email subject.
pub fn title(lead: &Lead, kind: &MessageKind) -> String {
    let flag = language_flag(&lead.language);
    match kind {
        MessageKind::Claimable { .. } => format!(
            "{} New {} Lead Available",
            flag,
            lead.language.to_uppercase()
        ),
        MessageKind::RuleAssigned { rule_name } => {
            format!("{} Lead Auto-Assigned: {}", flag, rule_name)
        }
        MessageKind::Reassigned => format!("{} Lead Assigned to You", flag),
    }
}

/// One-line summary used in in-app notifications.
pub fn headline(lead: &Lead) -> String {
    let summary = Summary::of(lead);
    format!("{} - {} - {}", summary.name, summary.segment, summary.budget)
}

/// Render the message a single agent receives about `lead`.
pub fn render(
    lead: &Lead,
    agent_first_name: &str,
    kind: &MessageKind,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> RenderedMessage {
    let summary = Summary::of(lead);
    let (action_url, action_label, intro) = match kind {
        MessageKind::Claimable { expires_at } => {
            let minutes = (*expires_at - now).num_minutes().max(0);
            (
                config.claim_url(&lead.id),
                "Claim this lead",
                format!(
                    "A new lead is available. The first agent to claim it gets it; the window closes in {} minutes.",
                    minutes
                ),
            )
        }
        MessageKind::RuleAssigned { rule_name } => (
            config.lead_url(&lead.id),
            "Open lead",
            format!(
                "This lead was assigned to you by the routing rule \"{}\".",
                rule_name
            ),
        ),
        MessageKind::Reassigned => (
            config.lead_url(&lead.id),
            "Open lead",
            "An administrator assigned this lead to you.".to_string(),
        ),
    };

    let subject = format!("{} - {}", title(lead, kind), summary.name);

    let mut text = String::new();
    let _ = writeln!(text, "Hi {},", agent_first_name);
    let _ = writeln!(text);
    let _ = writeln!(text, "{}", intro);
    let _ = writeln!(text);
    let _ = writeln!(text, "Lead: {}", summary.name);
    for (label, value) in summary.rows() {
        let _ = writeln!(text, "{}: {}", label, value);
    }
    let _ = writeln!(text);
    let _ = writeln!(text, "{}: {}", action_label, action_url);

    let mut html = String::new();
    let _ = write!(
        html,
        "<p>Hi {},</p><p>{}</p><table>",
        escape(agent_first_name, Html),
        escape(&intro, Html)
    );
    let _ = write!(
        html,
        "<tr><th align=\"left\">Lead</th><td>{}</td></tr>",
        escape(&summary.name, Html)
    );
    for (label, value) in summary.rows() {
        let _ = write!(
            html,
            "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
            label,
            escape(value, Html)
        );
    }
    let _ = write!(
        html,
        "</table><p><a href=\"{}\">{}</a></p>",
        escape(&action_url, Html),
        action_label
    );

    let chat = format!(
        "{}\n{} | {} | {} | {}\n{}: {}",
        title(lead, kind),
        summary.name,
        summary.segment,
        summary.budget,
        summary.locations,
        action_label,
        action_url
    );

    RenderedMessage {
        subject,
        text,
        html,
        chat,
        action_url,
    }
}
