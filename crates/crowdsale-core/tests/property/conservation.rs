//! Property tests: value is conserved through funding, finalization and refunds.

use crowdsale_core::Amount;
use proptest::prelude::*;

use crate::common::{addr, Harness};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const BACKERS: [&str; 4] = ["A", "E", "F", "G"];

/// A sequence of (backer, amount) contributions.
fn arb_contributions() -> impl Strategy<Value = Vec<(usize, Amount)>> {
    prop::collection::vec((0..BACKERS.len(), 1u64..1_000), 1..40)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn raised_equals_sum_of_contributions(contributions in arb_contributions()) {
        let h = Harness::new();
        let id = h.project(1_000_000, &["B"], 1);

        let mut expected = [0 as Amount; BACKERS.len()];
        for (backer, amount) in &contributions {
            h.fund(BACKERS[*backer], id, *amount);
            expected[*backer] += amount;
        }

        let project = h.engine.project(id).unwrap();
        prop_assert!(project.ledger.is_conserved());
        prop_assert_eq!(project.raised(), expected.iter().sum::<Amount>());

        let vault = h.engine.vault(project.vault).unwrap();
        prop_assert_eq!(vault.balance(), project.raised());
        for (index, name) in BACKERS.iter().enumerate() {
            prop_assert_eq!(h.engine.backer_funds(id, &addr(name)).unwrap(), expected[index]);
            prop_assert_eq!(vault.deposits_of(&addr(name)), expected[index]);
        }
    }

    #[test]
    fn finalization_follows_goal_threshold(
        goal in 1u64..5_000,
        contributions in arb_contributions(),
    ) {
        let h = Harness::new();
        let id = h.project(goal, &["B"], 1);
        for (backer, amount) in &contributions {
            h.fund(BACKERS[*backer], id, *amount);
        }

        let raised = h.engine.get_project(id).unwrap().raised;
        let outcome = h.engine.finalize(id).unwrap();
        prop_assert_eq!(outcome.released, raised >= goal);
        prop_assert_eq!(h.engine.vault(h.vault(id)).unwrap().is_released(), raised >= goal);
        prop_assert!(h.engine.finalize(id).is_err());
    }

    #[test]
    fn refunds_pay_out_exactly_what_was_contributed(contributions in arb_contributions()) {
        let h = Harness::new();
        let total: Amount = contributions.iter().map(|(_, amount)| amount).sum();
        let id = h.project(total + 1, &["B", "C"], 2);
        for (backer, amount) in &contributions {
            h.fund(BACKERS[*backer], id, *amount);
        }
        h.engine.finalize(id).unwrap();

        for name in BACKERS {
            // Claiming twice never pays twice.
            let _ = h.engine.claim_refund(&addr(name), id);
            prop_assert!(h.engine.claim_refund(&addr(name), id).is_err());
        }

        prop_assert_eq!(h.rail.total_delivered(), total);
        prop_assert_eq!(h.engine.get_project(id).unwrap().raised, 0);
        prop_assert_eq!(h.engine.vault(h.vault(id)).unwrap().balance(), 0);
    }
}
