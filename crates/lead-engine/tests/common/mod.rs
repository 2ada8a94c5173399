//! Shared fixtures for the lead-engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use database::{Agent, Database, Lead, NewAgent, NewRoutingRule, RoutingRule};
use lead_engine::{EngineConfig, LeadIntake, LeadRouter, ManualClock, RecordingSink};

pub struct Harness {
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
    pub router: LeadRouter,
}

impl Harness {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        Self::with_database(db)
    }

    pub fn with_database(db: Database) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        ));
        let sink = Arc::new(RecordingSink::new());
        let router = LeadRouter::new(
            db.clone(),
            clock.clone(),
            EngineConfig::default(),
            sink.clone(),
        );
        Self {
            db,
            clock,
            sink,
            router,
        }
    }

    pub async fn agent(&self, name: &str, languages: &[&str], max_active_leads: i64) -> Agent {
        self.router
            .registry
            .register(&NewAgent {
                first_name: name.to_string(),
                last_name: "Agent".to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                languages: languages.iter().map(|l| l.to_string()).collect(),
                chat_channel_id: None,
                chat_user_id: None,
                email_notifications: true,
                chat_notifications: false,
                max_active_leads,
            })
            .await
            .unwrap()
    }

    pub async fn language_rule(&self, name: &str, language: &str, agent: &Agent, priority: i64) -> RoutingRule {
        self.router
            .admin
            .create_rule(&NewRoutingRule {
                rule_name: name.to_string(),
                priority,
                match_language: vec![language.to_string()],
                assign_to_agent_id: agent.id.clone(),
                fallback_to_broadcast: true,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn agent_row(&self, agent: &Agent) -> Agent {
        self.router.registry.get(&agent.id).await.unwrap()
    }

    pub async fn lead_row(&self, id: &str) -> Lead {
        database::lead::get_lead(self.db.pool(), id).await.unwrap()
    }

    /// Every agent's stored count equals the leads it actually holds.
    pub async fn assert_counts_consistent(&self) {
        for agent in self.router.registry.list().await.unwrap() {
            let held = database::agent::count_held_leads(self.db.pool(), &agent.id)
                .await
                .unwrap();
            assert_eq!(
                agent.current_lead_count, held,
                "agent {} count drifted",
                agent.email
            );
        }
    }
}

pub fn intake(language: &str) -> LeadIntake {
    LeadIntake {
        first_name: "Marie".to_string(),
        last_name: "Curie".to_string(),
        phone: "600123456".to_string(),
        email: Some("marie@example.com".to_string()),
        language: Some(language.to_string()),
        budget_range: Some("€1M-€2M".to_string()),
        timeframe: Some("within_6_months".to_string()),
        ..Default::default()
    }
}
