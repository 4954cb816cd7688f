//! E2E: a shortfall keeps the vault locked and backers reclaim exactly once.

use crowdsale_core::{CrowdsaleError, ErrorKind, ProjectState};

use crate::common::{addr, Harness};

#[test]
fn shortfall_refunds_backer_once() {
    let h = Harness::new();
    let id = h.failed_project(1500, &[("A", 1400)]);

    let project = h.engine.get_project(id).unwrap();
    assert_eq!(project.state, ProjectState::FinalizedFailure);
    let vault = h.vault(id);
    assert!(!h.engine.vault(vault).unwrap().is_released());

    assert!(h.engine.claim_refund(&addr("A"), id).unwrap());
    assert_eq!(h.rail.balance_of(&addr("A")), 1400);
    assert_eq!(h.engine.backer_funds(id, &addr("A")).unwrap(), 0);
    assert_eq!(h.engine.deposits_of(vault, &addr("A")).unwrap(), 0);

    let err = h.engine.claim_refund(&addr("A"), id).unwrap_err();
    assert!(matches!(err, CrowdsaleError::NothingToRefund { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.rail.balance_of(&addr("A")), 1400);
}

#[test]
fn failed_vault_stays_locked_for_owners() {
    let h = Harness::new();
    let id = h.failed_project(1500, &[("A", 1400)]);
    let vault = h.vault(id);

    for owner in ["B", "C"] {
        let err = h
            .engine
            .submit_transaction(&addr(owner), vault, &addr(owner), 100)
            .unwrap_err();
        assert!(matches!(err, CrowdsaleError::VaultLocked { .. }));
    }
    assert_eq!(h.engine.vault(vault).unwrap().balance(), 1400);
}

#[test]
fn every_backer_reclaims_their_own_share() {
    let h = Harness::new();
    let id = h.failed_project(1500, &[("A", 600), ("E", 300), ("A", 200)]);

    h.engine.claim_refund(&addr("E"), id).unwrap();
    assert_eq!(h.rail.balance_of(&addr("E")), 300);
    assert_eq!(h.engine.backer_funds(id, &addr("A")).unwrap(), 800);

    h.engine.claim_refund(&addr("A"), id).unwrap();
    assert_eq!(h.rail.balance_of(&addr("A")), 800);

    let project = h.engine.get_project(id).unwrap();
    assert_eq!(project.raised, 0);
    assert_eq!(h.engine.vault(project.vault).unwrap().balance(), 0);
}

#[test]
fn stranger_has_nothing_to_refund() {
    let h = Harness::new();
    let id = h.failed_project(1500, &[("A", 1400)]);
    let err = h.engine.claim_refund(&addr("Z"), id).unwrap_err();
    assert!(matches!(err, CrowdsaleError::NothingToRefund { .. }));
}

#[test]
fn refunds_require_failed_state() {
    let h = Harness::new();
    let open = h.project(1500, &["B"], 1);
    h.fund("A", open, 100);
    let err = h.engine.claim_refund(&addr("A"), open).unwrap_err();
    assert!(matches!(err, CrowdsaleError::NotRefundable { .. }));
    assert_eq!(err.kind(), ErrorKind::State);

    let (succeeded, _) = h.released_project(500, &["B"], 1);
    let err = h.engine.claim_refund(&addr("A"), succeeded).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(h.engine.backer_funds(succeeded, &addr("A")).unwrap(), 500);
}

#[test]
fn unfunded_project_fails_on_finalize() {
    let h = Harness::new();
    let id = h.project(1, &["B"], 1);
    let outcome = h.engine.finalize(id).unwrap();
    assert_eq!(outcome.state, ProjectState::FinalizedFailure);
    assert!(!outcome.released);
}
