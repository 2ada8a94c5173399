//! Claim exclusivity and capacity bookkeeping under real concurrency.
//!
//! Uses a file-backed database so every pool connection sees the same data.

mod common;

use std::sync::Arc;

use common::{intake, Harness};
use database::Database;
use lead_engine::{ClaimResult, ReassignReason};
use tempfile::TempDir;

async fn file_harness(dir: &TempDir) -> Harness {
    let path = dir.path().join("leads.db");
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    Harness::with_database(db)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let h = Arc::new(file_harness(&dir).await);

    let mut agents = Vec::new();
    for i in 0..8 {
        agents.push(h.agent(&format!("Agent{}", i), &["fr"], 5).await);
    }
    let lead_id = h.router.engine.intake(intake("fr")).await.unwrap().lead.id;

    let mut tasks = Vec::new();
    for agent in &agents {
        let h = h.clone();
        let lead_id = lead_id.clone();
        let agent_id = agent.id.clone();
        tasks.push(tokio::spawn(async move {
            h.router.claims.claim(&lead_id, &agent_id).await.unwrap()
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0;
    for (task, agent) in tasks.into_iter().zip(&agents) {
        match task.await.unwrap() {
            ClaimResult::Claimed { .. } => winners.push(agent.id.clone()),
            ClaimResult::AlreadyClaimed => losers += 1,
            other => panic!("unexpected claim result {:?}", other),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(losers, agents.len() - 1);

    let lead = h.lead_row(&lead_id).await;
    assert_eq!(lead.assigned_agent_id.as_deref(), Some(winners[0].as_str()));
    h.assert_counts_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_exceed_capacity() {
    let dir = TempDir::new().unwrap();
    let h = Arc::new(file_harness(&dir).await);

    let agent = h.agent("Solo", &["fr"], 2).await;
    let mut lead_ids = Vec::new();
    for _ in 0..6 {
        lead_ids.push(h.router.engine.intake(intake("fr")).await.unwrap().lead.id);
    }

    let mut tasks = Vec::new();
    for lead_id in lead_ids {
        let h = h.clone();
        let agent_id = agent.id.clone();
        tasks.push(tokio::spawn(async move {
            h.router.claims.claim(&lead_id, &agent_id).await.unwrap()
        }));
    }

    let mut claimed = 0;
    for task in tasks {
        match task.await.unwrap() {
            ClaimResult::Claimed { .. } => claimed += 1,
            ClaimResult::NotEligible { .. } => {}
            other => panic!("unexpected claim result {:?}", other),
        }
    }

    assert_eq!(claimed, 2);
    assert_eq!(h.agent_row(&agent).await.current_lead_count, 2);
    h.assert_counts_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_racing_admin_moves_keep_counts() {
    let dir = TempDir::new().unwrap();
    let h = Arc::new(file_harness(&dir).await);

    let a1 = h.agent("Amelie", &["fr"], 10).await;
    let a2 = h.agent("Bruno", &["fr"], 10).await;
    let admin_target = h.agent("Target", &["fr"], 10).await;

    let mut lead_ids = Vec::new();
    for _ in 0..6 {
        lead_ids.push(h.router.engine.intake(intake("fr")).await.unwrap().lead.id);
    }

    let mut tasks = Vec::new();
    for (i, lead_id) in lead_ids.iter().enumerate() {
        for agent_id in [&a1.id, &a2.id] {
            let h = h.clone();
            let lead_id = lead_id.clone();
            let agent_id = agent_id.clone();
            tasks.push(tokio::spawn(async move {
                let _ = h.router.claims.claim(&lead_id, &agent_id).await;
            }));
        }
        if i % 2 == 0 {
            let h = h.clone();
            let lead_id = lead_id.clone();
            let target = admin_target.id.clone();
            tasks.push(tokio::spawn(async move {
                let _ = h
                    .router
                    .admin
                    .assign(&lead_id, &target, "admin", ReassignReason::Manual, None)
                    .await;
            }));
        }
        if i % 3 == 0 {
            let h = h.clone();
            let lead_id = lead_id.clone();
            tasks.push(tokio::spawn(async move {
                let _ = h.router.admin.restart(&lead_id, "admin").await;
            }));
        }
    }
    for task in tasks {
        task.await.unwrap();
    }

    h.assert_counts_consistent().await;
    assert!(h.router.registry.reconcile().await.unwrap().is_empty());
}
