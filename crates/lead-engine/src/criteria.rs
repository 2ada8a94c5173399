//! Match criteria compiled into a single predicate over a lead snapshot.

use std::collections::HashSet;

use database::{Lead, RoutingRule};

/// The lead attributes routing rules can look at.
#[derive(Debug, Clone, Copy)]
pub struct LeadSnapshot<'a> {
    pub language: &'a str,
    pub lead_source: &'a str,
    pub page_type: Option<&'a str>,
    pub page_slug: Option<&'a str>,
    pub lead_segment: &'a str,
    pub budget_range: Option<&'a str>,
    pub property_type: &'a [String],
    pub timeframe: Option<&'a str>,
}

impl<'a> From<&'a Lead> for LeadSnapshot<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            language: &lead.language,
            lead_source: &lead.lead_source,
            page_type: lead.page_type.as_deref(),
            page_slug: lead.page_slug.as_deref(),
            lead_segment: lead.lead_segment.as_str(),
            budget_range: lead.budget_range.as_deref(),
            property_type: &lead.property_type,
            timeframe: lead.timeframe.as_deref(),
        }
    }
}

type Check = Box<dyn Fn(&LeadSnapshot<'_>) -> bool + Send + Sync>;

fn check<F>(f: F) -> Check
where
    F: Fn(&LeadSnapshot<'_>) -> bool + Send + Sync + 'static,
{
    Box::new(f)
}

/// All of a rule's non-empty criteria, ANDed together.
pub struct Criteria {
    checks: Vec<Check>,
}

impl std::fmt::Debug for Criteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("checks", &self.checks.len())
            .finish()
    }
}

fn value_set(values: &[String]) -> Option<HashSet<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().cloned().collect())
    }
}

impl Criteria {
    /// Compile a rule's match lists. Empty lists are wildcards and add no check.
    pub fn compile(rule: &RoutingRule) -> Self {
        let mut checks: Vec<Check> = Vec::new();

        if let Some(set) = value_set(&rule.match_language) {
            let set: HashSet<String> = set.into_iter().map(|l| l.to_lowercase()).collect();
            checks.push(check(move |lead| set.contains(&lead.language.to_lowercase())));
        }

        if let Some(set) = value_set(&rule.match_lead_source) {
            checks.push(check(move |lead| set.contains(lead.lead_source)));
        }

        // Page criteria only apply to leads that came from a page.
        if let Some(set) = value_set(&rule.match_page_type) {
            checks.push(check(move |lead| {
                lead.page_type.map_or(true, |t| set.contains(t))
            }));
        }

        if let Some(set) = value_set(&rule.match_page_slug) {
            checks.push(check(move |lead| {
                lead.page_slug.map_or(true, |s| set.contains(s))
            }));
        }

        if let Some(set) = value_set(&rule.match_lead_segment) {
            checks.push(check(move |lead| set.contains(lead.lead_segment)));
        }

        if !rule.match_budget_range.is_empty() {
            let accepted = rule.match_budget_range.clone();
            checks.push(check(move |lead| match lead.budget_range {
                Some(budget) => accepted.iter().any(|b| budget.contains(b.as_str())),
                None => false,
            }));
        }

        if let Some(set) = value_set(&rule.match_property_type) {
            checks.push(check(move |lead| {
                lead.property_type.iter().any(|t| set.contains(t))
            }));
        }

        if let Some(set) = value_set(&rule.match_timeframe) {
            checks.push(check(move |lead| {
                lead.timeframe.is_some_and(|t| set.contains(t))
            }));
        }

        Self { checks }
    }

    pub fn matches(&self, lead: &LeadSnapshot<'_>) -> bool {
        self.checks.iter().all(|check| check(lead))
    }

    /// True when the rule has no criteria and matches every lead.
    pub fn is_catch_all(&self) -> bool {
        self.checks.is_empty()
    }
}
