//! Adversarial test: a withdrawal destination that re-enters the vault
//! workflow during delivery cannot trigger a second execution.

use std::sync::{Arc, Mutex};

use crowdsale_core::{CrowdsaleError, Payout, RailError, TxIndex};

use crate::common::{addr, Harness};

#[test]
fn reentrant_confirmation_cannot_execute_twice() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1500, &["B", "C", "E"], 2);
    let tx = h
        .engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 1000)
        .unwrap();

    let inner = Arc::new(Mutex::new(Vec::new()));
    let engine = Arc::downgrade(&h.engine);
    let seen = inner.clone();
    h.rail.on_delivery(
        addr("D"),
        Arc::new(move |_payout: &Payout| -> Result<(), RailError> {
            if let Some(engine) = engine.upgrade() {
                seen.lock()
                    .unwrap()
                    .push(engine.confirm_transaction(&addr("E"), vault, tx));
                seen.lock()
                    .unwrap()
                    .push(engine.confirm_transaction(&addr("B"), vault, tx));
            }
            Ok(())
        }),
    );

    let status = h.engine.confirm_transaction(&addr("C"), vault, tx).unwrap();
    assert!(status.is_executed());

    let inner = inner.lock().unwrap();
    assert!(matches!(inner[0], Err(CrowdsaleError::AlreadyExecuted { .. })));
    assert!(matches!(inner[1], Err(CrowdsaleError::AlreadyExecuted { .. })));
    assert_eq!(inner.len(), 2);
    assert_eq!(h.rail.balance_of(&addr("D")), 1000);
    assert_eq!(h.engine.vault(vault).unwrap().balance(), 500);
}

#[test]
fn reentrant_submission_sees_reduced_balance() {
    let h = Harness::new();
    let (_, vault) = h.released_project(1000, &["B"], 1);

    let inner: Arc<Mutex<Vec<Result<TxIndex, CrowdsaleError>>>> = Arc::new(Mutex::new(Vec::new()));
    let engine = Arc::downgrade(&h.engine);
    let seen = inner.clone();
    h.rail.on_delivery(
        addr("D"),
        Arc::new(move |_payout: &Payout| -> Result<(), RailError> {
            if let Some(engine) = engine.upgrade() {
                // Would overdraw if the first execution were not yet committed.
                seen.lock()
                    .unwrap()
                    .push(engine.submit_transaction(&addr("B"), vault, &addr("X"), 800));
            }
            Ok(())
        }),
    );

    h.engine
        .submit_transaction(&addr("B"), vault, &addr("D"), 800)
        .unwrap();

    let inner = inner.lock().unwrap();
    assert!(matches!(
        inner[0],
        Err(CrowdsaleError::AmountExceedsBalance {
            requested: 800,
            available: 200
        })
    ));
    assert_eq!(h.rail.balance_of(&addr("X")), 0);
    assert_eq!(h.engine.vault(vault).unwrap().balance(), 200);
}
