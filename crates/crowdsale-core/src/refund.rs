use crowdsale_types::{Address, Amount, CrowdsaleError, CrowdsaleResult, ProjectState};
use tracing::{info, warn};

use crate::rail::{Payout, PayoutReason};
use crate::registry::ProjectEntry;

/// Backer-triggered reclamation after a failed campaign.
///
/// Both the ledger entry and the vault's mirrored deposit are zeroed before
/// the payout leaves this module, so a re-entrant claim sees nothing to refund.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefundEngine;

impl RefundEngine {
    pub(crate) fn claim(entry: &mut ProjectEntry, caller: &Address) -> CrowdsaleResult<Payout> {
        let project = &entry.project;
        if project.state != ProjectState::FinalizedFailure {
            warn!(
                project = %project.id,
                caller = %caller,
                state = %project.state,
                "Refund claimed on a project that did not fail"
            );
            return Err(CrowdsaleError::NotRefundable {
                project: project.id,
                state: project.state,
            });
        }

        let amount = project.ledger.contribution_of(caller);
        if amount == 0 {
            return Err(CrowdsaleError::NothingToRefund {
                project: project.id,
                backer: caller.clone(),
            });
        }

        let deposited = entry.vault.deposits_of(caller);
        if deposited != amount {
            return Err(CrowdsaleError::Backend(format!(
                "{} ledger holds {} for {} but {} mirrors {}",
                project.id,
                amount,
                caller,
                entry.vault.id(),
                deposited
            )));
        }

        entry.vault.refund_deposit(caller)?;
        entry.project.ledger.take(caller);

        info!(
            project = %entry.project.id,
            backer = %caller,
            amount = amount,
            raised = entry.project.raised(),
            "Refund released"
        );

        Ok(Payout {
            destination: caller.clone(),
            amount,
            reason: PayoutReason::Refund {
                project: entry.project.id,
            },
        })
    }

    /// Undo a claim whose delivery failed.
    pub(crate) fn restore(entry: &mut ProjectEntry, backer: &Address, amount: Amount) {
        entry.project.ledger.restore(backer, amount);
        entry.vault.restore_deposit(backer, amount);
        warn!(
            project = %entry.project.id,
            backer = %backer,
            amount = amount,
            "Refund rolled back"
        );
    }
}
