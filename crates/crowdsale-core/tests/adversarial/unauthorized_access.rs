//! Adversarial test: outsiders and misordered calls cannot move value.

use crowdsale_core::{CrowdsaleError, ErrorKind, ProjectId, ProjectState, TxIndex, VaultId};

use crate::common::{addr, Harness};

#[test]
fn non_owner_cannot_submit_or_confirm() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1500, &["B", "C"], 2);

    let err = h
        .engine
        .submit_transaction(&addr("A"), vault, &addr("A"), 1500)
        .unwrap_err();
    assert!(matches!(err, CrowdsaleError::NotOwner { .. }));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let tx = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 500)
        .unwrap();
    let err = h
        .engine
        .confirm_transaction(&addr("mallory"), vault, tx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(h.engine.vault(vault).unwrap().confirmations(tx).unwrap(), 1);
}

#[test]
fn owner_cannot_confirm_twice() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1500, &["B", "C", "E"], 3);
    let tx = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 500)
        .unwrap();

    let err = h.engine.confirm_transaction(&addr("B"), vault, tx).unwrap_err();
    assert!(matches!(err, CrowdsaleError::AlreadyConfirmed { .. }));
    h.engine.confirm_transaction(&addr("C"), vault, tx).unwrap();
    let err = h.engine.confirm_transaction(&addr("C"), vault, tx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(h.rail.balance_of(&addr("D")), 0);
}

#[test]
fn owners_cannot_withdraw_before_finalization() {
    let h = Harness::new();
    let id = h.project(1500, &["B", "C"], 2);
    h.fund("A", id, 1500);
    let vault = h.vault(id);

    let err = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("B"), 1500)
        .unwrap_err();
    assert!(matches!(err, CrowdsaleError::VaultLocked { .. }));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn finalize_is_one_shot() {
    let h = Harness::new();
    let id = h.project(1500, &["B"], 1);
    h.fund("A", id, 1400);
    h.engine.finalize(id).unwrap();

    // Late funding cannot flip a failed project into success.
    h.engine.fund_project(&addr("E"), id, 100).unwrap_err();
    let err = h.engine.finalize(id).unwrap_err();
    assert!(matches!(
        err,
        CrowdsaleError::AlreadyFinalized {
            state: ProjectState::FinalizedFailure,
            ..
        }
    ));
    assert!(!h.engine.vault(h.vault(id)).unwrap().is_released());
}

#[test]
fn unknown_references_are_not_found() {
    let h = Harness::new();
    let (_, vault) = h.released_project(100, &["B", "C"], 2);

    let err = h
        .engine
        .confirm_transaction(&addr("B"), vault, TxIndex(3))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .engine
        .submit_transaction(&addr("B"), VaultId::new(), &addr("D"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    for err in [
        h.engine.finalize(ProjectId(42)).unwrap_err(),
        h.engine.claim_refund(&addr("A"), ProjectId(42)).unwrap_err(),
        h.engine.backer_funds(ProjectId(42), &addr("A")).unwrap_err(),
    ] {
        assert_eq!(err, CrowdsaleError::ProjectNotFound(ProjectId(42)));
    }
}
