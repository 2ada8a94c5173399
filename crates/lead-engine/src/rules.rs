//! Prioritized routing rule evaluation.

use database::{routing_rule, Database, RoutingRule};
use serde::Serialize;

use crate::criteria::{Criteria, LeadSnapshot};
use crate::error::Result;

/// A routing rule ready for evaluation.
#[derive(Debug)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub priority: i64,
    pub target_agent_id: String,
    pub fallback_to_broadcast: bool,
    criteria: Criteria,
}

/// What evaluation decided for a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Matched {
        rule_id: String,
        rule_name: String,
        target_agent_id: String,
        fallback_to_broadcast: bool,
    },
    NoMatch,
}

/// Active rules in evaluation order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules. Inactive rules are dropped; the rest are ordered by
    /// descending priority, keeping the input order among equal priorities.
    pub fn compile(rules: Vec<RoutingRule>) -> Self {
        let mut rules: Vec<CompiledRule> = rules
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| CompiledRule {
                criteria: Criteria::compile(&r),
                id: r.id,
                name: r.rule_name,
                priority: r.priority,
                target_agent_id: r.assign_to_agent_id,
                fallback_to_broadcast: r.fallback_to_broadcast,
            })
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Load and compile the active rules from storage.
    pub async fn load(database: &Database) -> Result<Self> {
        let rules = routing_rule::list_active_rules(database.pool()).await?;
        Ok(Self::compile(rules))
    }

    /// First rule, in priority order, whose criteria all hold.
    pub fn evaluate(&self, lead: &LeadSnapshot<'_>) -> RuleOutcome {
        self.rules
            .iter()
            .find(|rule| rule.criteria.matches(lead))
            .map(|rule| RuleOutcome::Matched {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                target_agent_id: rule.target_agent_id.clone(),
                fallback_to_broadcast: rule.fallback_to_broadcast,
            })
            .unwrap_or(RuleOutcome::NoMatch)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
