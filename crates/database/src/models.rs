//! Database models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A sales agent that can receive leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Agent {
    /// UUID assigned at registration.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Address used for lead emails.
    pub email: String,
    /// Language codes the agent works in (e.g. `["en", "fr"]`).
    #[sqlx(json)]
    pub languages: Vec<String>,
    /// Chat channel that receives lead posts, if bound.
    pub chat_channel_id: Option<String>,
    /// Chat user for direct messages, if bound.
    pub chat_user_id: Option<String>,
    pub email_notifications: bool,
    pub chat_notifications: bool,
    pub max_active_leads: i64,
    /// Claimed, non-archived leads currently held by the agent.
    pub current_lead_count: i64,
    pub is_active: bool,
    pub accepts_new_leads: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// "First Last".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether the agent lists `language` among their languages.
    pub fn speaks(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Remaining slots before `max_active_leads` is reached.
    pub fn available_capacity(&self) -> i64 {
        (self.max_active_leads - self.current_lead_count).max(0)
    }

    pub fn has_capacity(&self) -> bool {
        self.current_lead_count < self.max_active_leads
    }

    /// Active, accepting, under capacity, and speaks the language.
    pub fn is_eligible_for(&self, language: &str) -> bool {
        self.is_active && self.accepts_new_leads && self.has_capacity() && self.speaks(language)
    }
}

/// Fields supplied when registering an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub chat_channel_id: Option<String>,
    #[serde(default)]
    pub chat_user_id: Option<String>,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default)]
    pub chat_notifications: bool,
    #[serde(default = "default_max_active_leads")]
    pub max_active_leads: i64,
}

fn default_true() -> bool {
    true
}

fn default_max_active_leads() -> i64 {
    10
}

/// A prioritized routing rule. Empty match lists accept any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoutingRule {
    pub id: String,
    pub rule_name: String,
    pub description: Option<String>,
    /// Higher priorities are evaluated first.
    pub priority: i64,
    pub is_active: bool,
    #[sqlx(json)]
    pub match_language: Vec<String>,
    #[sqlx(json)]
    pub match_lead_source: Vec<String>,
    #[sqlx(json)]
    pub match_page_type: Vec<String>,
    #[sqlx(json)]
    pub match_page_slug: Vec<String>,
    #[sqlx(json)]
    pub match_lead_segment: Vec<String>,
    #[sqlx(json)]
    pub match_budget_range: Vec<String>,
    #[sqlx(json)]
    pub match_property_type: Vec<String>,
    #[sqlx(json)]
    pub match_timeframe: Vec<String>,
    pub assign_to_agent_id: String,
    /// Broadcast when the target agent cannot take the lead.
    pub fallback_to_broadcast: bool,
    pub total_matches: i64,
    pub last_matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a routing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoutingRule {
    pub rule_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub match_language: Vec<String>,
    #[serde(default)]
    pub match_lead_source: Vec<String>,
    #[serde(default)]
    pub match_page_type: Vec<String>,
    #[serde(default)]
    pub match_page_slug: Vec<String>,
    #[serde(default)]
    pub match_lead_segment: Vec<String>,
    #[serde(default)]
    pub match_budget_range: Vec<String>,
    #[serde(default)]
    pub match_property_type: Vec<String>,
    #[serde(default)]
    pub match_timeframe: Vec<String>,
    pub assign_to_agent_id: String,
    #[serde(default = "default_true")]
    pub fallback_to_broadcast: bool,
}

/// How a lead came to be held by its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AssignmentMethod {
    RuleMatched,
    AdminAssigned,
    AdminBulkAssigned,
    BroadcastClaimed,
    RoundRobin,
}

impl AssignmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentMethod::RuleMatched => "rule_matched",
            AssignmentMethod::AdminAssigned => "admin_assigned",
            AssignmentMethod::AdminBulkAssigned => "admin_bulk_assigned",
            AssignmentMethod::BroadcastClaimed => "broadcast_claimed",
            AssignmentMethod::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead temperature derived from the intake score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum LeadSegment {
    Hot,
    Warm,
    Cool,
    Cold,
}

impl LeadSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSegment::Hot => "Hot",
            LeadSegment::Warm => "Warm",
            LeadSegment::Cool => "Cool",
            LeadSegment::Cold => "Cold",
        }
    }
}

impl fmt::Display for LeadSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSegment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(LeadSegment::Hot),
            "warm" => Ok(LeadSegment::Warm),
            "cool" => Ok(LeadSegment::Cool),
            "cold" => Ok(LeadSegment::Cold),
            other => Err(format!("unknown lead segment: {}", other)),
        }
    }
}

/// Follow-up urgency derived from score and timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeadPriority {
    Urgent,
    High,
    Medium,
    Low,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadPriority::Urgent => "urgent",
            LeadPriority::High => "high",
            LeadPriority::Medium => "medium",
            LeadPriority::Low => "low",
        }
    }
}

impl fmt::Display for LeadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "urgent" => Ok(LeadPriority::Urgent),
            "high" => Ok(LeadPriority::High),
            "medium" => Ok(LeadPriority::Medium),
            "low" => Ok(LeadPriority::Low),
            other => Err(format!("unknown lead priority: {}", other)),
        }
    }
}

/// A stored lead row.
///
/// The nullable assignment columns are only meaningful together; the engine
/// reads them through its own state type rather than field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub country_prefix: String,
    pub email: Option<String>,
    /// Lower-case language code.
    pub language: String,
    pub lead_source: String,
    pub lead_source_detail: Option<String>,
    pub page_type: Option<String>,
    pub page_slug: Option<String>,
    pub page_url: Option<String>,
    pub message: Option<String>,
    pub budget_range: Option<String>,
    #[sqlx(json)]
    pub location_preference: Vec<String>,
    #[sqlx(json)]
    pub property_type: Vec<String>,
    pub timeframe: Option<String>,
    pub lead_score: i64,
    pub lead_segment: LeadSegment,
    pub lead_priority: LeadPriority,
    pub assigned_agent_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_method: Option<AssignmentMethod>,
    pub lead_claimed: bool,
    pub claim_window_expires_at: Option<DateTime<Utc>>,
    pub routing_rule_id: Option<String>,
    pub previous_agent_id: Option<String>,
    pub reassignment_count: i64,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub contact_complete: bool,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether this lead counts against `agent_id`'s capacity.
    pub fn is_held_by(&self, agent_id: &str) -> bool {
        !self.archived && self.lead_claimed && self.assigned_agent_id.as_deref() == Some(agent_id)
    }
}

/// A validated lead ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub country_prefix: String,
    pub email: Option<String>,
    pub language: String,
    pub lead_source: String,
    pub lead_source_detail: Option<String>,
    pub page_type: Option<String>,
    pub page_slug: Option<String>,
    pub page_url: Option<String>,
    pub message: Option<String>,
    pub budget_range: Option<String>,
    pub location_preference: Vec<String>,
    pub property_type: Vec<String>,
    pub timeframe: Option<String>,
    pub lead_score: i64,
    pub lead_segment: LeadSegment,
    pub lead_priority: LeadPriority,
}

/// An entry in a lead's activity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeadActivity {
    pub id: i64,
    pub lead_id: String,
    /// Agent or admin that caused the activity, if any.
    pub actor_id: Option<String>,
    pub activity_type: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// An in-app notification shown to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeadNotification {
    pub id: i64,
    pub agent_id: String,
    pub lead_id: Option<String>,
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub action_url: Option<String>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new in-app notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub agent_id: String,
    pub lead_id: Option<String>,
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub action_url: Option<String>,
}

/// A manual move of a lead from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeadReassignment {
    pub id: i64,
    pub lead_id: String,
    pub from_agent_id: Option<String>,
    pub to_agent_id: String,
    pub reassigned_by: String,
    /// `unclaimed`, `no_contact` or `manual`.
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A teaser for a lead an agent may still claim. Contact details are withheld.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClaimableLead {
    pub notification_id: i64,
    pub lead_id: String,
    pub first_name: String,
    pub language: String,
    pub lead_source: String,
    pub lead_segment: LeadSegment,
    pub lead_priority: LeadPriority,
    pub budget_range: Option<String>,
    pub timeframe: Option<String>,
    pub claim_window_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
