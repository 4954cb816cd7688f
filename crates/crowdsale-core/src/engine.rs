//! Crowdsale engine facade.
//!
//! Every public operation runs against a single write lock over the registry
//! and the audit journal. Outbound value leaves through the [`ValueRail`] only
//! after that lock is dropped, so recipient code may call straight back into
//! the engine. If delivery fails, the committed effects are compensated under
//! a fresh lock and the caller sees `TransferFailed`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use crowdsale_types::{
    Address, Amount, CrowdsaleError, CrowdsaleResult, ProjectId, ProjectState, TxIndex, VaultId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditEvent, AuditJournal};
use crate::clock::Clock;
use crate::config::CrowdsaleConfig;
use crate::finalization::{FinalizationOutcome, FinalizationPolicy};
use crate::ledger::contribute;
use crate::rail::{Payout, ValueRail};
use crate::refund::RefundEngine;
use crate::registry::{Project, ProjectRegistry, ProjectSnapshot, ProjectTerms};
use crate::snapshot::StateSnapshot;
use crate::vault::{Confirmation, EscrowVault};

/// Outcome of a confirmation or explicit execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Still collecting confirmations.
    Pending { confirmations: usize, required: usize },
    /// Threshold reached and the value was delivered.
    Executed { destination: Address, amount: Amount },
}

impl ExecutionStatus {
    pub fn is_executed(&self) -> bool {
        matches!(self, ExecutionStatus::Executed { .. })
    }
}

/// Aggregate figures across all projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdsaleStats {
    pub projects: usize,
    pub open: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_raised: Amount,
    pub total_held: Amount,
    pub total_withdrawn: Amount,
}

struct EngineState {
    registry: ProjectRegistry,
    journal: AuditJournal,
}

/// Funding ledger plus escrow authorization engine.
///
/// Shareable across threads behind an `Arc`.
pub struct Crowdsale {
    state: RwLock<EngineState>,
    clock: Arc<dyn Clock>,
    rail: Arc<dyn ValueRail>,
    config: CrowdsaleConfig,
    finalization: FinalizationPolicy,
}

impl Crowdsale {
    /// Build an empty engine. Fails with `Config` if `config` does not validate.
    pub fn new(
        config: CrowdsaleConfig,
        clock: Arc<dyn Clock>,
        rail: Arc<dyn ValueRail>,
    ) -> CrowdsaleResult<Self> {
        config.validate()?;
        let journal = AuditJournal::new(config.audit.enabled);
        let finalization = FinalizationPolicy::new(&config.finalization);
        Ok(Self {
            state: RwLock::new(EngineState {
                registry: ProjectRegistry::new(),
                journal,
            }),
            clock,
            rail,
            config,
            finalization,
        })
    }

    /// Build an engine from a verified snapshot.
    pub fn from_snapshot(
        config: CrowdsaleConfig,
        clock: Arc<dyn Clock>,
        rail: Arc<dyn ValueRail>,
        snapshot: StateSnapshot,
    ) -> CrowdsaleResult<Self> {
        let engine = Self::new(config, clock, rail)?;
        engine.restore(snapshot)?;
        Ok(engine)
    }

    pub fn config(&self) -> &CrowdsaleConfig {
        &self.config
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub fn create_project(
        &self,
        creator: &Address,
        terms: ProjectTerms,
    ) -> CrowdsaleResult<ProjectId> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let id = state
            .registry
            .create(creator, terms, now, &self.config.limits)?;

        let project = &state.registry.entry(id)?.project;
        let event = AuditEvent::ProjectCreated {
            project: id,
            vault: project.vault,
            creator: creator.clone(),
            goal: project.goal,
            deadline: project.deadline,
        };
        state.journal.append(event, now);
        Ok(id)
    }

    pub fn get_project(&self, id: ProjectId) -> CrowdsaleResult<ProjectSnapshot> {
        self.read_state()?.registry.snapshot(id)
    }

    /// Full project record, including the contribution map.
    pub fn project(&self, id: ProjectId) -> CrowdsaleResult<Project> {
        Ok(self.read_state()?.registry.entry(id)?.project.clone())
    }

    pub fn goal_reached(&self, id: ProjectId) -> CrowdsaleResult<bool> {
        self.read_state()?.registry.goal_reached(id)
    }

    pub fn backer_funds(&self, id: ProjectId, backer: &Address) -> CrowdsaleResult<Amount> {
        self.read_state()?.registry.backer_funds(id, backer)
    }

    pub fn project_ids(&self) -> CrowdsaleResult<Vec<ProjectId>> {
        Ok(self.read_state()?.registry.ids())
    }

    pub fn statistics(&self) -> CrowdsaleResult<CrowdsaleStats> {
        let state = self.read_state()?;
        let mut stats = CrowdsaleStats::default();
        for entry in state.registry.entries() {
            stats.projects += 1;
            match entry.project.state {
                ProjectState::Open => stats.open += 1,
                ProjectState::FinalizedSuccess => stats.succeeded += 1,
                ProjectState::FinalizedFailure => stats.failed += 1,
            }
            stats.total_raised = stats.total_raised.saturating_add(entry.project.raised());
            stats.total_held = stats.total_held.saturating_add(entry.vault.balance());
            stats.total_withdrawn = stats
                .total_withdrawn
                .saturating_add(entry.vault.total_withdrawn());
        }
        Ok(stats)
    }

    // ── Funding ──────────────────────────────────────────────────────

    /// Record `amount` from `caller` and move it into the project's vault.
    /// Returns the caller's cumulative contribution.
    pub fn fund_project(
        &self,
        caller: &Address,
        id: ProjectId,
        amount: Amount,
    ) -> CrowdsaleResult<Amount> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let entry = state.registry.entry_mut(id)?;
        let contributed = contribute(entry, caller, amount, now)?;
        let raised = entry.project.raised();

        state.journal.append(
            AuditEvent::Funded {
                project: id,
                backer: caller.clone(),
                amount,
                raised,
            },
            now,
        );
        Ok(contributed)
    }

    // ── Finalization ─────────────────────────────────────────────────

    pub fn finalize(&self, id: ProjectId) -> CrowdsaleResult<FinalizationOutcome> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let entry = state.registry.entry_mut(id)?;
        let outcome = self.finalization.finalize(entry, now)?;

        state.journal.append(
            AuditEvent::Finalized {
                project: id,
                state: outcome.state,
                raised: outcome.raised,
            },
            now,
        );
        Ok(outcome)
    }

    // ── Refunds ──────────────────────────────────────────────────────

    /// Return the caller's whole contribution from a failed project.
    pub fn claim_refund(&self, caller: &Address, id: ProjectId) -> CrowdsaleResult<bool> {
        let now = self.clock.now();
        let payout = {
            let mut state = self.write_state()?;
            let entry = state.registry.entry_mut(id)?;
            let payout = RefundEngine::claim(entry, caller)?;
            state.journal.append(
                AuditEvent::Refunded {
                    project: id,
                    backer: caller.clone(),
                    amount: payout.amount,
                },
                now,
            );
            payout
        };

        self.deliver_or_rollback(&payout, "claim_refund", |state| {
            let entry = state.registry.entry_mut(id)?;
            RefundEngine::restore(entry, &payout.destination, payout.amount);
            Ok(())
        })?;
        Ok(true)
    }

    // ── Vault workflow ───────────────────────────────────────────────

    /// Submit a withdrawal request from a released vault. The submitter is
    /// the first confirmation; a 1-of-M vault executes immediately.
    pub fn submit_transaction(
        &self,
        caller: &Address,
        vault: VaultId,
        destination: &Address,
        amount: Amount,
    ) -> CrowdsaleResult<TxIndex> {
        let now = self.clock.now();
        let confirmation = {
            let mut state = self.write_state()?;
            let entry = state.registry.vault_entry_mut(&vault)?;
            let confirmation =
                entry
                    .vault
                    .submit_transaction(caller, destination.clone(), amount, now)?;
            state.journal.append(
                AuditEvent::TransactionSubmitted {
                    vault,
                    tx: confirmation.tx,
                    submitter: caller.clone(),
                    destination: destination.clone(),
                    amount,
                },
                now,
            );
            record_execution(&mut state.journal, vault, &confirmation, now);
            confirmation
        };

        let tx = confirmation.tx;
        if let Some(payout) = confirmation.payout {
            self.deliver_or_rollback(&payout, "submit_transaction", |state| {
                state.registry.vault_entry_mut(&vault)?.vault.void_transaction(tx);
                Ok(())
            })?;
        }
        Ok(tx)
    }

    /// Add the caller's confirmation; executes once the threshold is reached.
    pub fn confirm_transaction(
        &self,
        caller: &Address,
        vault: VaultId,
        tx: TxIndex,
    ) -> CrowdsaleResult<ExecutionStatus> {
        let now = self.clock.now();
        let confirmation = {
            let mut state = self.write_state()?;
            let entry = state.registry.vault_entry_mut(&vault)?;
            let confirmation = entry.vault.confirm_transaction(caller, tx, now)?;
            state.journal.append(
                AuditEvent::TransactionConfirmed {
                    vault,
                    tx,
                    owner: caller.clone(),
                    confirmations: confirmation.confirmations,
                },
                now,
            );
            record_execution(&mut state.journal, vault, &confirmation, now);
            confirmation
        };

        match confirmation.payout {
            Some(payout) => {
                self.deliver_or_rollback(&payout, "confirm_transaction", |state| {
                    let entry = state.registry.vault_entry_mut(&vault)?;
                    entry.vault.revert_execution(tx);
                    entry.vault.withdraw_confirmation(tx, caller);
                    Ok(())
                })?;
                Ok(ExecutionStatus::Executed {
                    destination: payout.destination,
                    amount: payout.amount,
                })
            }
            None => Ok(ExecutionStatus::Pending {
                confirmations: confirmation.confirmations,
                required: confirmation.required,
            }),
        }
    }

    pub fn deposits_of(&self, vault: VaultId, address: &Address) -> CrowdsaleResult<Amount> {
        Ok(self.read_state()?.registry.vault(&vault)?.deposits_of(address))
    }

    pub fn required(&self, vault: VaultId) -> CrowdsaleResult<usize> {
        Ok(self.read_state()?.registry.vault(&vault)?.required())
    }

    /// Copy of the vault's current state.
    pub fn vault(&self, vault: VaultId) -> CrowdsaleResult<EscrowVault> {
        Ok(self.read_state()?.registry.vault(&vault)?.clone())
    }

    pub fn vault_of(&self, id: ProjectId) -> CrowdsaleResult<VaultId> {
        Ok(self.read_state()?.registry.entry(id)?.project.vault)
    }

    // ── Audit & snapshots ────────────────────────────────────────────

    pub fn audit_entries(&self) -> CrowdsaleResult<Vec<AuditEntry>> {
        Ok(self.read_state()?.journal.entries().to_vec())
    }

    pub fn verify_audit_chain(&self) -> CrowdsaleResult<bool> {
        Ok(self.read_state()?.journal.verify_chain())
    }

    pub fn snapshot(&self) -> CrowdsaleResult<StateSnapshot> {
        let state = self.read_state()?;
        Ok(StateSnapshot::capture(
            &state.registry,
            &state.journal,
            self.clock.now(),
        ))
    }

    /// Replace the engine state with a verified snapshot. On failure the
    /// current state is untouched.
    pub fn restore(&self, snapshot: StateSnapshot) -> CrowdsaleResult<()> {
        let (registry, journal) = snapshot.into_state()?;
        let mut state = self.write_state()?;
        info!(
            projects = registry.len(),
            journal_entries = journal.len(),
            "Engine state restored from snapshot"
        );
        state.registry = registry;
        state.journal = journal;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn read_state(&self) -> CrowdsaleResult<RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|e| CrowdsaleError::Backend(format!("engine state lock poisoned: {}", e)))
    }

    fn write_state(&self) -> CrowdsaleResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|e| CrowdsaleError::Backend(format!("engine state lock poisoned: {}", e)))
    }

    /// Hand a payout to the rail. Must be called with no state lock held.
    fn deliver_or_rollback<F>(
        &self,
        payout: &Payout,
        operation: &str,
        rollback: F,
    ) -> CrowdsaleResult<()>
    where
        F: FnOnce(&mut EngineState) -> CrowdsaleResult<()>,
    {
        let reason = match self.rail.deliver(payout) {
            Ok(()) => {
                debug!(
                    destination = %payout.destination,
                    amount = payout.amount,
                    operation,
                    "Payout delivered"
                );
                return Ok(());
            }
            Err(err) => err.to_string(),
        };

        warn!(
            destination = %payout.destination,
            amount = payout.amount,
            operation,
            reason = %reason,
            "Payout refused, rolling back"
        );

        let transfer_failed = || CrowdsaleError::TransferFailed {
            destination: payout.destination.clone(),
            amount: payout.amount,
            reason: reason.clone(),
        };

        let now = self.clock.now();
        let mut state = match self.write_state() {
            Ok(state) => state,
            Err(err) => {
                error!(operation, error = %err, "Cannot roll back refused payout");
                return Err(CrowdsaleError::Backend(format!(
                    "{} after {}: {}",
                    err,
                    operation,
                    transfer_failed()
                )));
            }
        };
        let event = match rollback(&mut *state) {
            Ok(()) => AuditEvent::RolledBack {
                operation: operation.to_string(),
                reason: reason.clone(),
            },
            Err(err) => {
                error!(
                    destination = %payout.destination,
                    amount = payout.amount,
                    operation,
                    error = %err,
                    "Rollback of refused payout failed"
                );
                AuditEvent::RollbackFailed {
                    operation: operation.to_string(),
                    reason: reason.clone(),
                    error: err.to_string(),
                }
            }
        };
        state.journal.append(event, now);

        Err(transfer_failed())
    }
}

fn record_execution(
    journal: &mut AuditJournal,
    vault: VaultId,
    confirmation: &Confirmation,
    now: DateTime<Utc>,
) {
    if let Some(payout) = &confirmation.payout {
        journal.append(
            AuditEvent::TransactionExecuted {
                vault,
                tx: confirmation.tx,
                destination: payout.destination.clone(),
                amount: payout.amount,
            },
            now,
        );
    }
}
