//! End-to-end routing scenarios against an in-memory database.
//!
//! Run with:
//!   cargo test -p lead-engine --test scenarios

mod common;

use chrono::Duration;
use common::{intake, Harness};
use database::{reassignment, routing_rule, AssignmentMethod, NewRoutingRule};
use lead_engine::{
    AssignmentResult, ClaimResult, Clock, EngineError, IneligibleReason, LeadFilter, LeadState, LeadStatus,
    NoticeKind, ReassignReason,
};

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_rule_agent_at_capacity_falls_back_to_broadcast() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 1).await;
    let a2 = h.agent("Bruno", &["fr", "en"], 5).await;
    let _a3 = h.agent("Carla", &["es"], 5).await;
    let rule = h.language_rule("French leads", "fr", &a1, 10).await;

    // Fill A1.
    let first = h.router.engine.intake(intake("fr")).await.unwrap();
    assert!(matches!(first.result, AssignmentResult::Direct { .. }));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);
    h.sink.take();

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    match &routed.result {
        AssignmentResult::Broadcast {
            eligible_agent_ids,
            expires_at,
            rule_id,
        } => {
            assert_eq!(eligible_agent_ids, &vec![a2.id.clone()]);
            assert_eq!(*expires_at, h.clock.now() + Duration::minutes(15));
            assert_eq!(rule_id.as_deref(), Some(rule.id.as_str()));
        }
        other => panic!("expected broadcast, got {:?}", other),
    }
    assert!(matches!(
        LeadState::of(&routed.lead),
        LeadState::BroadcastOpen { .. }
    ));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);
    assert_eq!(h.agent_row(&a2).await.current_lead_count, 0);

    let notices = h.sink.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Broadcast);
    assert_eq!(notices[0].agents.len(), 1);
    assert_eq!(notices[0].agents[0].id, a2.id);

    let stored = routing_rule::get_rule(h.db.pool(), &rule.id).await.unwrap();
    assert_eq!(stored.total_matches, 2);
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_rule_agent_with_capacity_gets_lead_directly() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let _a2 = h.agent("Bruno", &["fr"], 3).await;
    let rule = h.language_rule("French leads", "fr", &a1, 10).await;

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();

    assert_eq!(
        routed.result,
        AssignmentResult::Direct {
            agent_id: a1.id.clone(),
            rule_id: rule.id.clone(),
            rule_name: "French leads".to_string(),
        }
    );
    assert_eq!(routed.lead.assignment_method, Some(AssignmentMethod::RuleMatched));
    assert_eq!(routed.lead.routing_rule_id.as_deref(), Some(rule.id.as_str()));
    assert!(routed.lead.lead_claimed);
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);

    let notices = h.sink.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(
        notices[0].kind,
        NoticeKind::RuleAssigned {
            rule_name: "French leads".to_string()
        }
    );
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_higher_priority_rule_wins() {
    let h = Harness::new().await;
    let low = h.agent("Low", &["fr"], 3).await;
    let high = h.agent("High", &["fr"], 3).await;
    h.language_rule("Catch french", "fr", &low, 1).await;
    h.language_rule("Priority french", "fr", &high, 50).await;

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    assert_eq!(routed.lead.assigned_agent_id.as_deref(), Some(high.id.as_str()));
}

#[tokio::test]
async fn test_rule_without_fallback_leaves_lead_unresolved() {
    let h = Harness::new().await;
    let paused = h.agent("Paused", &["de"], 3).await;
    let _other = h.agent("Other", &["de"], 3).await;
    h.router
        .registry
        .set_availability(&paused.id, None, Some(false))
        .await
        .unwrap();
    h.router
        .admin
        .create_rule(&NewRoutingRule {
            rule_name: "German, no fallback".to_string(),
            match_language: vec!["de".to_string()],
            assign_to_agent_id: paused.id.clone(),
            fallback_to_broadcast: false,
            ..Default::default()
        })
        .await
        .unwrap();

    let routed = h.router.engine.intake(intake("de")).await.unwrap();
    assert!(matches!(routed.result, AssignmentResult::Unresolved { .. }));
    assert_eq!(LeadState::of(&routed.lead), LeadState::Unassigned);
    assert!(h.sink.take().is_empty());

    let stats = h.router.reports.stats().await.unwrap();
    assert_eq!(stats.unresolved, 1);
}

#[tokio::test]
async fn test_no_rules_broadcasts_to_speakers_only() {
    let h = Harness::new().await;
    let es = h.agent("Sofia", &["es"], 3).await;
    let _fr = h.agent("Amelie", &["fr"], 3).await;

    let routed = h.router.engine.intake(intake("ES")).await.unwrap();
    match routed.result {
        AssignmentResult::Broadcast {
            eligible_agent_ids,
            rule_id,
            ..
        } => {
            assert_eq!(eligible_agent_ids, vec![es.id]);
            assert!(rule_id.is_none());
        }
        other => panic!("expected broadcast, got {:?}", other),
    }
    assert_eq!(routed.lead.language, "es");
}

#[tokio::test]
async fn test_create_rule_with_unknown_agent_is_validation_error() {
    let h = Harness::new().await;
    let err = h
        .router
        .admin
        .create_rule(&NewRoutingRule {
            rule_name: "Ghost".to_string(),
            assign_to_agent_id: "no-such-agent".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

// ============================================================================
// Claims
// ============================================================================

#[tokio::test]
async fn test_second_claimer_gets_already_claimed() {
    let h = Harness::new().await;
    let _a1 = h.agent("Amelie", &["fr"], 3).await;
    let a2 = h.agent("Bruno", &["fr"], 3).await;
    let a3 = h.agent("Chloe", &["fr"], 3).await;

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    assert_eq!(routed.result.label(), "broadcast");
    let lead_id = routed.lead.id.clone();

    h.clock.advance(Duration::minutes(3));
    let first = h.router.claims.claim(&lead_id, &a2.id).await.unwrap();
    match first {
        ClaimResult::Claimed { lead } => {
            assert_eq!(lead.assigned_agent_id.as_deref(), Some(a2.id.as_str()));
            assert_eq!(lead.assignment_method, Some(AssignmentMethod::BroadcastClaimed));
            assert!(lead.claim_window_expires_at.is_none());
        }
        other => panic!("expected claim, got {:?}", other),
    }

    let second = h.router.claims.claim(&lead_id, &a3.id).await.unwrap();
    assert_eq!(second, ClaimResult::AlreadyClaimed);

    assert_eq!(h.agent_row(&a2).await.current_lead_count, 1);
    assert_eq!(h.agent_row(&a3).await.current_lead_count, 0);
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_claim_by_ineligible_agent_changes_nothing() {
    let h = Harness::new().await;
    let _fr = h.agent("Amelie", &["fr"], 3).await;
    let es = h.agent("Sofia", &["es"], 3).await;

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    let result = h.router.claims.claim(&routed.lead.id, &es.id).await.unwrap();
    assert!(matches!(result, ClaimResult::NotEligible { .. }));

    let lead = h.lead_row(&routed.lead.id).await;
    assert!(matches!(LeadState::of(&lead), LeadState::BroadcastOpen { .. }));
    assert_eq!(h.agent_row(&es).await.current_lead_count, 0);
}

#[tokio::test]
async fn test_claim_of_archived_lead_is_rejected() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    h.router.admin.archive(&routed.lead.id, "admin").await.unwrap();

    let err = h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);
}

#[tokio::test]
async fn test_expired_window_is_reported_not_escalated() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();

    assert!(h.router.claims.expired().await.unwrap().is_empty());
    h.clock.advance(Duration::minutes(16));

    let expired = h.router.claims.expired().await.unwrap();
    assert_eq!(expired.len(), 1);
    let view = h.router.reports.view(&routed.lead.id).await.unwrap();
    assert_eq!(view.state_name, "expired");
    assert_eq!(h.router.reports.stats().await.unwrap().expired_claim, 1);

    // A late claim is refused and leaves the lead for an admin.
    let result = h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();
    assert_eq!(
        result,
        ClaimResult::NotEligible {
            reason: IneligibleReason::WindowExpired
        }
    );
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);
    assert_eq!(h.router.reports.stats().await.unwrap().expired_claim, 1);
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_restart_reopens_expired_window_for_claims() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let a2 = h.agent("Bruno", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();

    h.clock.advance(Duration::minutes(60));
    let late = h.router.claims.claim(&routed.lead.id, &a2.id).await.unwrap();
    assert!(matches!(late, ClaimResult::NotEligible { .. }));
    assert_eq!(h.router.claims.expired().await.unwrap().len(), 1);

    h.router.admin.restart(&routed.lead.id, "admin").await.unwrap();
    assert!(h.router.claims.expired().await.unwrap().is_empty());

    let result = h.router.claims.claim(&routed.lead.id, &a2.id).await.unwrap();
    assert!(matches!(result, ClaimResult::Claimed { .. }));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);
    assert_eq!(h.agent_row(&a2).await.current_lead_count, 1);
    h.assert_counts_consistent().await;
}

// ============================================================================
// Admin overrides
// ============================================================================

#[tokio::test]
async fn test_bulk_assign_over_capacity_is_rejected_whole() {
    let h = Harness::new().await;
    let target = h.agent("Target", &["en"], 3).await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(h.router.engine.intake(intake("nl")).await.unwrap().lead.id);
    }

    let err = h
        .router
        .admin
        .bulk_assign(&ids, &target.id, "admin", ReassignReason::Unclaimed, None)
        .await
        .unwrap_err();
    match err {
        EngineError::CapacityExceeded {
            agent_id,
            requested,
            available,
        } => {
            assert_eq!(agent_id, target.id);
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("expected capacity error, got {:?}", other),
    }

    assert_eq!(h.agent_row(&target).await.current_lead_count, 0);
    for id in &ids {
        let lead = h.lead_row(id).await;
        assert!(lead.assigned_agent_id.is_none());
        assert!(!lead.lead_claimed);
        assert!(reassignment::list_reassignments(h.db.pool(), id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_bulk_assign_within_capacity() {
    let h = Harness::new().await;
    let target = h.agent("Target", &["en"], 3).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.router.engine.intake(intake("nl")).await.unwrap().lead.id);
    }
    h.sink.take();

    let result = h
        .router
        .admin
        .bulk_assign(&ids, &target.id, "admin", ReassignReason::Unclaimed, Some("weekly sweep"))
        .await
        .unwrap();
    assert_eq!(result.moved, 3);
    assert!(result
        .leads
        .iter()
        .all(|l| l.assignment_method == Some(AssignmentMethod::AdminBulkAssigned)));
    assert_eq!(h.agent_row(&target).await.current_lead_count, 3);
    assert_eq!(h.sink.take().len(), 3);
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_manual_reassign_moves_capacity_and_records_history() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let a2 = h.agent("Bruno", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();
    h.sink.take();

    let lead = h
        .router
        .admin
        .assign(&routed.lead.id, &a2.id, "admin", ReassignReason::NoContact, None)
        .await
        .unwrap();

    assert_eq!(lead.assigned_agent_id.as_deref(), Some(a2.id.as_str()));
    assert_eq!(lead.previous_agent_id.as_deref(), Some(a1.id.as_str()));
    assert_eq!(lead.reassignment_count, 1);
    assert_eq!(lead.assignment_method, Some(AssignmentMethod::AdminAssigned));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);
    assert_eq!(h.agent_row(&a2).await.current_lead_count, 1);

    let history = reassignment::list_reassignments(h.db.pool(), &lead.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_agent_id.as_deref(), Some(a1.id.as_str()));
    assert_eq!(history[0].reason, "no_contact");

    let notices = h.sink.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(
        notices[0].kind,
        NoticeKind::Reassigned {
            previous_agent_id: Some(a1.id.clone())
        }
    );

    // Assigning to the current holder again is a no-op.
    h.router
        .admin
        .assign(&lead.id, &a2.id, "admin", ReassignReason::Manual, None)
        .await
        .unwrap();
    assert_eq!(h.agent_row(&a2).await.current_lead_count, 1);
    assert!(h.sink.take().is_empty());
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_sla_breached_lead_leaves_report_when_archived() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();

    h.clock.advance(Duration::hours(25));
    let stats = h.router.reports.stats().await.unwrap();
    assert_eq!(stats.sla_breach, 1);
    let breached = h
        .router
        .reports
        .list(&LeadFilter {
            status: LeadStatus::SlaBreach,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(breached.len(), 1);
    assert_eq!(breached[0].lead.id, routed.lead.id);

    let archived = h.router.admin.archive(&routed.lead.id, "admin").await.unwrap();
    assert!(archived.archived);
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);

    let stats = h.router.reports.stats().await.unwrap();
    assert_eq!(stats.sla_breach, 0);
    assert_eq!(stats.archived, 1);
    assert_eq!(stats.total, 0);

    // Archiving twice does not release again.
    h.router.admin.archive(&routed.lead.id, "admin").await.unwrap();
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_restart_releases_holder_and_reopens_window() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let a2 = h.agent("Bruno", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);
    h.sink.take();

    h.clock.advance(Duration::hours(2));
    let restarted = h.router.admin.restart(&routed.lead.id, "admin").await.unwrap();

    let expected_expiry = h.clock.now() + Duration::minutes(15);
    assert_eq!(
        LeadState::of(&restarted.lead),
        LeadState::BroadcastOpen {
            expires_at: expected_expiry
        }
    );
    assert_eq!(restarted.lead.previous_agent_id.as_deref(), Some(a1.id.as_str()));
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);

    let notices = h.sink.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Broadcast);
    assert_eq!(notices[0].agents.len(), 2);

    // Restarting again never releases twice.
    h.router.admin.restart(&routed.lead.id, "admin").await.unwrap();
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);

    let result = h.router.claims.claim(&routed.lead.id, &a2.id).await.unwrap();
    assert!(matches!(result, ClaimResult::Claimed { .. }));
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_unarchive_requires_explicit_reroute() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    h.language_rule("French leads", "fr", &a1, 1).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);

    h.router.admin.archive(&routed.lead.id, "admin").await.unwrap();
    let err = h.router.admin.restart(&routed.lead.id, "admin").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let lead = h.router.admin.unarchive(&routed.lead.id, "admin").await.unwrap();
    assert_eq!(LeadState::of(&lead), LeadState::Unassigned);
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 0);

    let rerouted = h.router.admin.reroute(&lead.id).await.unwrap();
    assert_eq!(rerouted.result.label(), "direct");
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);

    let err = h.router.admin.reroute(&lead.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    h.assert_counts_consistent().await;
}

#[tokio::test]
async fn test_unarchive_of_live_lead_leaves_no_history() {
    let h = Harness::new().await;
    h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();

    let lead = h.router.admin.unarchive(&routed.lead.id, "admin").await.unwrap();
    assert!(!lead.archived);
    assert_eq!(lead.claim_window_expires_at, routed.lead.claim_window_expires_at);

    let unarchive_notes = |activity: &[database::LeadActivity]| {
        activity.iter().filter(|a| a.activity_type == "unarchive").count()
    };
    let activity = database::activity::list_activities(h.db.pool(), &lead.id).await.unwrap();
    assert_eq!(unarchive_notes(&activity), 0);

    h.router.admin.archive(&lead.id, "admin").await.unwrap();
    h.router.admin.unarchive(&lead.id, "admin").await.unwrap();
    h.router.admin.unarchive(&lead.id, "admin").await.unwrap();
    let activity = database::activity::list_activities(h.db.pool(), &lead.id).await.unwrap();
    assert_eq!(unarchive_notes(&activity), 1);
}

#[tokio::test]
async fn test_mark_contacted_requires_holder() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();

    let err = h
        .router
        .admin
        .mark_contacted(&routed.lead.id, &a1.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();
    h.clock.advance(Duration::hours(30));
    let lead = h.router.admin.mark_contacted(&routed.lead.id, &a1.id).await.unwrap();
    assert!(lead.contact_complete);
    assert_eq!(lead.last_contact_at, Some(h.clock.now()));
    assert_eq!(h.router.reports.stats().await.unwrap().sla_breach, 0);

    let activity = database::activity::list_activities(h.db.pool(), &lead.id).await.unwrap();
    let kinds: Vec<&str> = activity.iter().map(|a| a.activity_type.as_str()).collect();
    assert_eq!(kinds, vec!["assignment", "claim", "contact"]);
}

#[tokio::test]
async fn test_reconcile_reports_drift() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 3).await;
    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();

    sqlx::query("UPDATE agents SET current_lead_count = 3 WHERE id = ?")
        .bind(&a1.id)
        .execute(h.db.pool())
        .await
        .unwrap();

    let drift = h.router.registry.reconcile().await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].agent_id, a1.id);
    assert_eq!(drift[0].stored, 3);
    assert_eq!(drift[0].actual, 1);
    assert_eq!(h.agent_row(&a1).await.current_lead_count, 1);
    assert!(h.router.registry.reconcile().await.unwrap().is_empty());
}
