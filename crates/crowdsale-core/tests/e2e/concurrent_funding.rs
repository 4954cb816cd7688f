//! E2E: many backers funding one project from parallel tasks.

use crowdsale_core::Amount;

use crate::common::{addr, Harness};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_contributions_are_conserved() {
    let h = Harness::new();
    let id = h.project(10_000, &["B", "C"], 2);

    let mut handles = Vec::new();
    for backer in 0..8 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            let who = addr(&format!("backer-{}", backer));
            for _ in 0..50 {
                engine.fund_project(&who, id, 3).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let project = h.engine.project(id).unwrap();
    assert_eq!(project.raised(), 8 * 50 * 3);
    assert!(project.ledger.is_conserved());
    for backer in 0..8 {
        assert_eq!(
            h.engine
                .backer_funds(id, &addr(&format!("backer-{}", backer)))
                .unwrap(),
            150
        );
    }

    let vault = h.engine.vault(h.vault(id)).unwrap();
    assert_eq!(vault.balance(), project.raised());
    assert_eq!(vault.deposits().values().sum::<Amount>(), project.raised());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finalize_happens_once() {
    let h = Harness::new();
    let id = h.project(100, &["B"], 1);
    h.fund("A", id, 100);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move { engine.finalize(id).is_ok() }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}
