//! Intake scoring: 0-100 score, segment and priority.

use database::{LeadPriority, LeadSegment};
use serde::Serialize;

use crate::intake::LeadIntake;

/// Score and its derived labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeadScore {
    pub score: i64,
    pub segment: LeadSegment,
    pub priority: LeadPriority,
}

fn budget_points(budget: &str) -> f64 {
    let b = budget.to_lowercase();
    if b.contains("2m") || b.contains("2,000,000") || b.contains("€2") {
        30.0
    } else if b.contains("1m") || b.contains("1,000,000") || b.contains("€1") {
        25.0
    } else if b.contains("500k") || b.contains("500,000") {
        20.0
    } else if b.contains("300k") || b.contains("300,000") {
        15.0
    } else {
        10.0
    }
}

fn is_short_timeframe(tf: &str) -> bool {
    tf.contains("6_month") || tf.contains("immediate")
}

fn timeframe_points(timeframe: &str) -> f64 {
    let tf = timeframe.to_lowercase();
    if is_short_timeframe(&tf) {
        25.0
    } else if tf.contains("1_year") || tf.contains("12_month") {
        20.0
    } else if tf.contains("2_year") {
        15.0
    } else {
        5.0
    }
}

fn intake_points(intake: &LeadIntake) -> f64 {
    if intake.intake_complete {
        20.0
    } else if intake.questions_answered >= 3 {
        15.0
    } else if intake.questions_answered >= 1 {
        10.0
    } else {
        0.0
    }
}

fn location_points(count: usize) -> f64 {
    match count {
        0 => 5.0,
        1 => 10.0,
        _ => 15.0,
    }
}

fn criteria_points(intake: &LeadIntake) -> f64 {
    let filled = [
        !intake.property_type.is_empty(),
        intake.property_purpose.is_some(),
        intake.bedrooms_desired.is_some(),
        intake.sea_view_importance.is_some(),
    ]
    .iter()
    .filter(|f| **f)
    .count();
    filled as f64 * 2.5
}

pub fn segment_for(score: i64) -> LeadSegment {
    match score {
        s if s >= 80 => LeadSegment::Hot,
        s if s >= 60 => LeadSegment::Warm,
        s if s >= 40 => LeadSegment::Cool,
        _ => LeadSegment::Cold,
    }
}

pub fn priority_for(score: i64, timeframe: Option<&str>) -> LeadPriority {
    let tf = timeframe.unwrap_or_default().to_lowercase();
    if score >= 80 || is_short_timeframe(&tf) {
        LeadPriority::Urgent
    } else if score >= 60 || tf.contains("1_year") {
        LeadPriority::High
    } else if score >= 40 {
        LeadPriority::Medium
    } else {
        LeadPriority::Low
    }
}

/// Score a lead from what the intake form collected.
pub fn score(intake: &LeadIntake) -> LeadScore {
    let raw = budget_points(intake.budget_range.as_deref().unwrap_or_default())
        + timeframe_points(intake.timeframe.as_deref().unwrap_or_default())
        + intake_points(intake)
        + location_points(intake.location_preference.len())
        + criteria_points(intake);
    let score = (raw.round() as i64).min(100);

    LeadScore {
        score,
        segment: segment_for(score),
        priority: priority_for(score, intake.timeframe.as_deref()),
    }
}
