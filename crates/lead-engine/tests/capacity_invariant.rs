//! Randomized operation sequences. After every step each agent's stored count
//! must equal the number of leads it holds.

mod common;

use chrono::Duration;
use common::{intake, Harness};
use lead_engine::ReassignReason;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Intake { language: usize },
    Claim { lead: usize, agent: usize },
    Assign { lead: usize, agent: usize },
    BulkAssign { leads: Vec<usize>, agent: usize },
    Restart { lead: usize },
    Archive { lead: usize },
    Unarchive { lead: usize },
    Reroute { lead: usize },
    Pause { agent: usize, accepts: bool },
    Advance { minutes: i64 },
}

const LANGUAGES: [&str; 3] = ["fr", "en", "de"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..LANGUAGES.len()).prop_map(|language| Op::Intake { language }),
        4 => (0..16usize, 0..4usize).prop_map(|(lead, agent)| Op::Claim { lead, agent }),
        2 => (0..16usize, 0..4usize).prop_map(|(lead, agent)| Op::Assign { lead, agent }),
        1 => (prop::collection::vec(0..16usize, 1..5), 0..4usize)
            .prop_map(|(leads, agent)| Op::BulkAssign { leads, agent }),
        2 => (0..16usize).prop_map(|lead| Op::Restart { lead }),
        2 => (0..16usize).prop_map(|lead| Op::Archive { lead }),
        1 => (0..16usize).prop_map(|lead| Op::Unarchive { lead }),
        1 => (0..16usize).prop_map(|lead| Op::Reroute { lead }),
        1 => (0..4usize, any::<bool>()).prop_map(|(agent, accepts)| Op::Pause { agent, accepts }),
        1 => (1..120i64).prop_map(|minutes| Op::Advance { minutes }),
    ]
}

async fn run(ops: Vec<Op>) {
    let h = Harness::new().await;
    let agents = vec![
        h.agent("Amelie", &["fr"], 2).await,
        h.agent("Bruno", &["fr", "en"], 3).await,
        h.agent("Dieter", &["de", "en"], 1).await,
        h.agent("Eva", &["en"], 2).await,
    ];
    h.language_rule("French", "fr", &agents[0], 10).await;
    h.language_rule("German", "de", &agents[2], 5).await;

    let mut leads: Vec<String> = Vec::new();
    let pick = |leads: &Vec<String>, i: usize| -> Option<String> {
        if leads.is_empty() {
            None
        } else {
            Some(leads[i % leads.len()].clone())
        }
    };

    for op in ops {
        // Errors are expected for illegal transitions; only the invariant matters.
        match op {
            Op::Intake { language } => {
                let routed = h.router.engine.intake(intake(LANGUAGES[language])).await.unwrap();
                leads.push(routed.lead.id);
            }
            Op::Claim { lead, agent } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h.router.claims.claim(&id, &agents[agent].id).await;
                }
            }
            Op::Assign { lead, agent } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h
                        .router
                        .admin
                        .assign(&id, &agents[agent].id, "admin", ReassignReason::Manual, None)
                        .await;
                }
            }
            Op::BulkAssign { leads: picks, agent } => {
                let ids: Vec<String> = picks.iter().filter_map(|&i| pick(&leads, i)).collect();
                if !ids.is_empty() {
                    let _ = h
                        .router
                        .admin
                        .bulk_assign(&ids, &agents[agent].id, "admin", ReassignReason::Unclaimed, None)
                        .await;
                }
            }
            Op::Restart { lead } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h.router.admin.restart(&id, "admin").await;
                }
            }
            Op::Archive { lead } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h.router.admin.archive(&id, "admin").await;
                }
            }
            Op::Unarchive { lead } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h.router.admin.unarchive(&id, "admin").await;
                }
            }
            Op::Reroute { lead } => {
                if let Some(id) = pick(&leads, lead) {
                    let _ = h.router.admin.reroute(&id).await;
                }
            }
            Op::Pause { agent, accepts } => {
                h.router
                    .registry
                    .set_availability(&agents[agent].id, None, Some(accepts))
                    .await
                    .unwrap();
            }
            Op::Advance { minutes } => h.clock.advance(Duration::minutes(minutes)),
        }

        h.assert_counts_consistent().await;
        for agent in h.router.registry.list().await.unwrap() {
            assert!(agent.current_lead_count <= agent.max_active_leads);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn capacity_matches_held_leads(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops));
    }
}
