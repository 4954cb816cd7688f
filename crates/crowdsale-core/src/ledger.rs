//! Funding ledger: the source of truth for who contributed how much.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crowdsale_types::{Address, Amount, CrowdsaleError, CrowdsaleResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::ProjectEntry;

/// Per-project backer → cumulative contribution map plus its running total.
///
/// `raised == Σ contributions` holds after every public call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingLedger {
    contributions: BTreeMap<Address, Amount>,
    raised: Amount,
}

impl FundingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raised(&self) -> Amount {
        self.raised
    }

    /// Cumulative contribution of `backer`; zero when unknown.
    pub fn contribution_of(&self, backer: &Address) -> Amount {
        self.contributions.get(backer).copied().unwrap_or(0)
    }

    pub fn contributions(&self) -> &BTreeMap<Address, Amount> {
        &self.contributions
    }

    pub fn backer_count(&self) -> usize {
        self.contributions.len()
    }

    /// Conservation check: the running total equals the sum of entries.
    pub fn is_conserved(&self) -> bool {
        self.contributions
            .values()
            .try_fold(0 as Amount, |acc, amount| acc.checked_add(*amount))
            == Some(self.raised)
    }

    /// Add `amount` to `backer`'s entry. Accumulates, never overwrites.
    pub(crate) fn record(&mut self, backer: &Address, amount: Amount) -> CrowdsaleResult<Amount> {
        let contributed = self
            .contribution_of(backer)
            .checked_add(amount)
            .ok_or_else(|| CrowdsaleError::overflow("backer contribution"))?;
        let raised = self
            .raised
            .checked_add(amount)
            .ok_or_else(|| CrowdsaleError::overflow("raised total"))?;

        self.contributions.insert(backer.clone(), contributed);
        self.raised = raised;
        Ok(contributed)
    }

    /// Zero `backer`'s entry, returning what it held.
    pub(crate) fn take(&mut self, backer: &Address) -> Amount {
        let amount = self.contributions.remove(backer).unwrap_or(0);
        self.raised = self.raised.saturating_sub(amount);
        amount
    }

    /// Put back an entry removed by [`FundingLedger::take`] or an amount added
    /// by [`FundingLedger::record`] in the same operation.
    pub(crate) fn restore(&mut self, backer: &Address, amount: Amount) {
        let restored = self.contribution_of(backer).saturating_add(amount);
        self.contributions.insert(backer.clone(), restored);
        self.raised = self.raised.saturating_add(amount);
    }

    pub(crate) fn unrecord(&mut self, backer: &Address, amount: Amount) {
        let remaining = self.contribution_of(backer).saturating_sub(amount);
        if remaining == 0 {
            self.contributions.remove(backer);
        } else {
            self.contributions.insert(backer.clone(), remaining);
        }
        self.raised = self.raised.saturating_sub(amount);
    }
}

/// Accept a contribution into an open project and forward it into the bound
/// vault's custody, mirroring the depositor record.
///
/// All-or-nothing: every precondition is checked before the first write, and
/// the ledger write is undone if the vault rejects the deposit.
pub(crate) fn contribute(
    entry: &mut ProjectEntry,
    backer: &Address,
    amount: Amount,
    now: DateTime<Utc>,
) -> CrowdsaleResult<Amount> {
    let project = &entry.project;
    if !project.state.is_open() {
        return Err(CrowdsaleError::ProjectNotOpen {
            project: project.id,
            state: project.state,
        });
    }
    if now > project.deadline {
        return Err(CrowdsaleError::DeadlinePassed {
            project: project.id,
            deadline: project.deadline,
            now,
        });
    }
    if amount == 0 {
        return Err(CrowdsaleError::ZeroAmount);
    }

    let contributed = entry.project.ledger.record(backer, amount)?;
    if let Err(err) = entry.vault.record_deposit(backer, amount) {
        entry.project.ledger.unrecord(backer, amount);
        return Err(err);
    }

    debug!(
        project = %entry.project.id,
        backer = %backer,
        amount = amount,
        contributed = contributed,
        raised = entry.project.ledger.raised(),
        "Contribution recorded"
    );
    Ok(contributed)
}
