//! E2E: a funded project releases its vault and owners withdraw by quorum.

use crowdsale_core::{CrowdsaleError, ErrorKind, ExecutionStatus, ProjectState, TxIndex, TxStatus};

use crate::common::{addr, Harness};

#[test]
fn two_of_two_withdrawal_reaches_destination() {
    let h = Harness::new();
    let id = h.project(1500, &["B", "C"], 2);
    h.fund("A", id, 1500);

    let outcome = h.engine.finalize(id).unwrap();
    assert_eq!(outcome.state, ProjectState::FinalizedSuccess);
    assert!(outcome.released);

    let vault = h.vault(id);
    assert_eq!(h.engine.required(vault).unwrap(), 2);
    assert!(h.engine.vault(vault).unwrap().is_released());

    let tx = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 1000)
        .unwrap();
    assert_eq!(tx, TxIndex(0));
    assert_eq!(h.rail.balance_of(&addr("D")), 0);

    let status = h.engine.confirm_transaction(&addr("C"), vault, tx).unwrap();
    assert_eq!(
        status,
        ExecutionStatus::Executed {
            destination: addr("D"),
            amount: 1000
        }
    );
    assert_eq!(h.rail.balance_of(&addr("D")), 1000);

    let view = h.engine.vault(vault).unwrap();
    assert_eq!(view.balance(), 500);
    assert_eq!(view.transaction(tx).unwrap().status, TxStatus::Executed);
    assert_eq!(view.transaction(tx).unwrap().confirmations(), 2);
    // The depositor record is a mirror of contributions, not of custody.
    assert_eq!(view.deposits_of(&addr("A")), 1500);
}

#[test]
fn executed_transaction_cannot_execute_again() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1500, &["B", "C", "E"], 2);

    let tx = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 600)
        .unwrap();
    h.engine.confirm_transaction(&addr("C"), vault, tx).unwrap();

    let err = h.engine.confirm_transaction(&addr("E"), vault, tx).unwrap_err();
    assert!(matches!(err, CrowdsaleError::AlreadyExecuted { .. }));
    assert_eq!(err.kind(), ErrorKind::State);

    assert_eq!(h.rail.balance_of(&addr("D")), 600);
    assert_eq!(h.rail.deliveries().len(), 1);
}

#[test]
fn one_of_many_executes_on_submission() {
    let h = Harness::new();
    let (_, vault) = h.released_project(900, &["B", "C"], 1);

    let tx = h
        .engine
        .submit_transaction(&addr("C"), vault, &addr("D"), 900)
        .unwrap();
    assert!(h.engine.vault(vault).unwrap().transaction(tx).unwrap().is_executed());
    assert_eq!(h.rail.balance_of(&addr("D")), 900);
    assert_eq!(h.engine.vault(vault).unwrap().balance(), 0);
}

#[test]
fn withdrawals_cannot_exceed_held_balance() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1000, &["B", "C"], 2);

    let err = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 1001)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let first = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 700)
        .unwrap();
    let second = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("E"), 700)
        .unwrap();
    h.engine.confirm_transaction(&addr("C"), vault, first).unwrap();

    let err = h
        .engine
        .confirm_transaction(&addr("C"), vault, second)
        .unwrap_err();
    assert!(matches!(err, CrowdsaleError::AmountExceedsBalance { .. }));
    assert_eq!(h.engine.vault(vault).unwrap().balance(), 300);
    assert_eq!(h.rail.balance_of(&addr("E")), 0);
}

#[test]
fn goal_exceeded_still_succeeds() {
    let h = Harness::new();
    let id = h.project(1000, &["B"], 1);
    h.fund("A", id, 700);
    h.fund("E", id, 700);

    let outcome = h.engine.finalize(id).unwrap();
    assert_eq!(outcome.state, ProjectState::FinalizedSuccess);
    assert_eq!(h.engine.vault(h.vault(id)).unwrap().balance(), 1400);
}
