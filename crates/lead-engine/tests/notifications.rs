//! Notification fan-out: channels, failure isolation, in-app rows and the
//! post-commit queue.

mod common;

use std::sync::Arc;

use common::{intake, Harness};
use database::notification::{self, LEAD_REASSIGNED, NEW_LEAD_AVAILABLE};
use database::{Agent, NewAgent};
use lead_engine::{
    ClaimResult, DispatchQueue, EngineConfig, LeadNotice, LeadRouter, NoticeKind,
    NotificationDispatcher, RecordingTransport, ReassignReason,
};

async fn chat_agent(h: &Harness, name: &str) -> Agent {
    h.router
        .registry
        .register(&NewAgent {
            first_name: name.to_string(),
            last_name: "Agent".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            languages: vec!["fr".to_string()],
            chat_channel_id: Some(format!("C-{}", name)),
            chat_user_id: Some(format!("U-{}", name)),
            email_notifications: true,
            chat_notifications: true,
            max_active_leads: 5,
        })
        .await
        .unwrap()
}

fn dispatcher(h: &Harness, transport: Arc<RecordingTransport>) -> NotificationDispatcher<Arc<RecordingTransport>> {
    NotificationDispatcher::new(
        transport,
        h.db.clone(),
        EngineConfig {
            app_url: "https://crm.example.com".to_string(),
            ..Default::default()
        },
        h.clock.clone(),
    )
}

#[tokio::test]
async fn test_broadcast_reaches_every_channel() {
    let h = Harness::new().await;
    let a1 = chat_agent(&h, "Amelie").await;
    let a2 = h.agent("Bruno", &["fr"], 5).await;

    h.router.engine.intake(intake("fr")).await.unwrap();
    let notices = h.sink.take();
    assert_eq!(notices.len(), 1);

    let transport = Arc::new(RecordingTransport::new());
    let report = dispatcher(&h, transport.clone()).notify(&notices[0]).await;

    assert_eq!(report.emails_sent(), 2);
    assert_eq!(report.chat_sent(), 2);
    assert_eq!(report.chat_failed(), 0);
    assert!(report.agents.iter().all(|a| a.in_app));

    let emails = transport.emails();
    assert_eq!(emails.len(), 2);
    assert!(emails[0].subject.contains("New FR Lead Available"));
    assert!(emails[0]
        .text
        .contains(&format!("https://crm.example.com/crm/agent/leads/{}/claim", notices[0].lead.id)));

    let chats = transport.chats();
    let targets: Vec<&str> = chats.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(targets, vec!["C-Amelie", "U-Amelie"]);

    for agent in [&a1, &a2] {
        let claimable = h.router.claims.claimable_for(&agent.id).await.unwrap();
        assert_eq!(claimable.len(), 1);
        assert_eq!(claimable[0].first_name, "Marie");
    }
}

#[tokio::test]
async fn test_channel_failures_are_recorded_not_raised() {
    let h = Harness::new().await;
    let a1 = chat_agent(&h, "Amelie").await;

    h.router.engine.intake(intake("fr")).await.unwrap();
    let notice = h.sink.take().remove(0);

    let transport = Arc::new(RecordingTransport::new());
    transport.fail_email(true);
    transport.fail_chat(true);
    let report = dispatcher(&h, transport.clone()).notify(&notice).await;

    assert_eq!(report.emails_sent(), 0);
    assert_eq!(report.emails_failed(), 1);
    assert_eq!(report.chat_failed(), 2);
    assert!(report.agents[0].in_app);
    assert!(transport.emails().is_empty());

    // The lead itself is untouched by delivery failures.
    let claimable = h.router.claims.claimable_for(&a1.id).await.unwrap();
    assert_eq!(claimable.len(), 1);
}

#[tokio::test]
async fn test_claimed_lead_leaves_claimable_list() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 5).await;
    let a2 = h.agent("Bruno", &["fr"], 5).await;

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    let notice = h.sink.take().remove(0);
    dispatcher(&h, Arc::new(RecordingTransport::new()))
        .notify(&notice)
        .await;

    let result = h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();
    assert!(matches!(result, ClaimResult::Claimed { .. }));

    assert!(h.router.claims.claimable_for(&a2.id).await.unwrap().is_empty());
    assert!(h.router.claims.claimable_for("missing").await.is_err());
}

#[tokio::test]
async fn test_reassignment_closes_previous_agents_inbox() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 5).await;
    let a2 = h.agent("Bruno", &["fr"], 5).await;
    let transport = Arc::new(RecordingTransport::new());
    let dispatch = dispatcher(&h, transport.clone());

    let routed = h.router.engine.intake(intake("fr")).await.unwrap();
    dispatch.notify(&h.sink.take().remove(0)).await;
    h.router.claims.claim(&routed.lead.id, &a1.id).await.unwrap();

    h.router
        .admin
        .assign(&routed.lead.id, &a2.id, "admin", ReassignReason::NoContact, None)
        .await
        .unwrap();
    let notice = h.sink.take().remove(0);
    assert_eq!(notice.agents.len(), 1);
    dispatch.notify(&notice).await;

    let previous = notification::list_for_agent(h.db.pool(), &a1.id, true).await.unwrap();
    assert!(previous.is_empty());

    let inbox = notification::list_for_agent(h.db.pool(), &a2.id, false).await.unwrap();
    let types: Vec<&str> = inbox.iter().map(|n| n.notification_type.as_str()).collect();
    assert_eq!(types, vec![LEAD_REASSIGNED, NEW_LEAD_AVAILABLE]);
    assert!(transport.emails().last().unwrap().subject.contains("Lead Assigned to You"));
}

#[tokio::test]
async fn test_dispatch_queue_delivers_after_commit() {
    let db = database::Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    let transport = Arc::new(RecordingTransport::new());

    let (router, worker) = LeadRouter::start(
        db.clone(),
        Arc::new(lead_engine::SystemClock),
        EngineConfig::default(),
        transport.clone(),
    );
    let agent = router
        .registry
        .register(&NewAgent {
            first_name: "Amelie".to_string(),
            last_name: "Agent".to_string(),
            email: "amelie@example.com".to_string(),
            languages: vec!["fr".to_string()],
            chat_channel_id: None,
            chat_user_id: None,
            email_notifications: true,
            chat_notifications: false,
            max_active_leads: 5,
        })
        .await
        .unwrap();

    router.engine.intake(intake("fr")).await.unwrap();

    // Dropping every handle closes the queue; the worker drains and exits.
    drop(router);
    worker.await.unwrap();

    assert_eq!(transport.emails().len(), 1);
    assert_eq!(transport.emails()[0].to, agent.email);
    let inbox = notification::list_for_agent(db.pool(), &agent.id, false).await.unwrap();
    assert_eq!(inbox.len(), 1);
}

#[tokio::test]
async fn test_notice_kinds_map_to_inbox_types() {
    let h = Harness::new().await;
    let a1 = h.agent("Amelie", &["fr"], 5).await;
    let lead = h.router.engine.intake(intake("fr")).await.unwrap().lead;
    h.sink.take();

    let notice = LeadNotice {
        lead,
        agents: vec![a1.clone()],
        kind: NoticeKind::RuleAssigned {
            rule_name: "French".to_string(),
        },
    };
    dispatcher(&h, Arc::new(RecordingTransport::new()))
        .notify(&notice)
        .await;

    let inbox = notification::list_for_agent(h.db.pool(), &a1.id, false).await.unwrap();
    assert_eq!(inbox[0].notification_type, notification::RULE_ASSIGNED);
    assert!(inbox[0].action_url.as_deref().unwrap().ends_with(&notice.lead.id));
}
