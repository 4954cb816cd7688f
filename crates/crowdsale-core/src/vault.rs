use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use crowdsale_types::{Address, Amount, CrowdsaleError, CrowdsaleResult, TxIndex, VaultId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::rail::{Payout, PayoutReason};

/// Lifecycle of a vault transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Collecting confirmations.
    Pending,
    /// Value delivered to the destination. Immutable from here on.
    Executed,
    /// The submitting call was rolled back after its inline execution could not
    /// be delivered while later submissions already followed it. Inert.
    Voided,
}

/// An authorized withdrawal request in a vault's append-only log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTransaction {
    pub destination: Address,
    pub amount: Amount,
    pub submitted_by: Address,
    pub confirmed_by: BTreeSet<Address>,
    pub status: TxStatus,
    pub submitted_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl VaultTransaction {
    pub fn confirmations(&self) -> usize {
        self.confirmed_by.len()
    }

    pub fn is_executed(&self) -> bool {
        self.status == TxStatus::Executed
    }
}

/// Result of recording a confirmation (or a submission, which self-confirms).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub tx: TxIndex,
    pub confirmations: usize,
    pub required: usize,
    /// Present when this confirmation reached the threshold and the transaction
    /// was executed. The payout still has to be delivered by the caller.
    pub payout: Option<Payout>,
}

/// Capability to open a vault's release gate.
///
/// Issued once when the vault is opened and held by the owning project's
/// record. Not `Clone`: opening the gate consumes it, so the gate can only be
/// flipped once and never by vault owners.
#[derive(Debug)]
pub struct ReleaseKey {
    vault: VaultId,
}

impl ReleaseKey {
    /// Re-issue the key for a vault restored from a snapshot while still locked.
    pub(crate) fn reissue(vault: VaultId) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> VaultId {
        self.vault
    }
}

/// Escrow vault holding the value raised by exactly one project.
///
/// The vault knows nothing about goals or deadlines. It tracks:
/// - a mirrored deposit ledger (who put value in),
/// - the held balance (what is still in custody),
/// - an immutable owner set and confirmation threshold (N-of-M),
/// - a one-way release gate,
/// - an append-only transaction log.
///
/// All mutators are crate-private; external callers reach them only through
/// the engine's operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowVault {
    id: VaultId,
    owners: Vec<Address>,
    required: usize,
    deposits: BTreeMap<Address, Amount>,
    balance: Amount,
    released: bool,
    transactions: Vec<VaultTransaction>,
}

impl EscrowVault {
    /// Open a locked vault, returning the key that can later release it.
    pub(crate) fn open(
        owners: Vec<Address>,
        required: usize,
    ) -> CrowdsaleResult<(Self, ReleaseKey)> {
        if owners.is_empty() {
            return Err(CrowdsaleError::NoOwners);
        }

        let mut seen = BTreeSet::new();
        for owner in &owners {
            if !seen.insert(owner) {
                return Err(CrowdsaleError::DuplicateOwner(owner.clone()));
            }
        }

        if required == 0 || required > owners.len() {
            return Err(CrowdsaleError::InvalidThreshold {
                required,
                owners: owners.len(),
            });
        }

        let id = VaultId::new();
        let vault = Self {
            id,
            owners,
            required,
            deposits: BTreeMap::new(),
            balance: 0,
            released: false,
            transactions: Vec::new(),
        };
        Ok((vault, ReleaseKey { vault: id }))
    }

    pub fn id(&self) -> VaultId {
        self.id
    }

    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.iter().any(|owner| owner == address)
    }

    /// Confirmation threshold.
    pub fn required(&self) -> usize {
        self.required
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Value currently held in custody.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Mirrored deposit of `address`; zero for unknown depositors.
    pub fn deposits_of(&self, address: &Address) -> Amount {
        self.deposits.get(address).copied().unwrap_or(0)
    }

    pub fn deposits(&self) -> &BTreeMap<Address, Amount> {
        &self.deposits
    }

    pub fn transactions(&self) -> &[VaultTransaction] {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn transaction(&self, tx: TxIndex) -> CrowdsaleResult<&VaultTransaction> {
        self.transactions
            .get(tx.0)
            .ok_or(CrowdsaleError::TransactionNotFound { vault: self.id, tx })
    }

    pub fn confirmations(&self, tx: TxIndex) -> CrowdsaleResult<usize> {
        Ok(self.transaction(tx)?.confirmations())
    }

    pub fn is_confirmed_by(&self, tx: TxIndex, owner: &Address) -> CrowdsaleResult<bool> {
        Ok(self.transaction(tx)?.confirmed_by.contains(owner))
    }

    /// Sum of all executed withdrawals.
    pub fn total_withdrawn(&self) -> Amount {
        self.transactions
            .iter()
            .filter(|t| t.is_executed())
            .map(|t| t.amount)
            .sum()
    }

    // ── Custody ──────────────────────────────────────────────────────

    /// Take `amount` into custody on behalf of `depositor`.
    pub(crate) fn record_deposit(
        &mut self,
        depositor: &Address,
        amount: Amount,
    ) -> CrowdsaleResult<Amount> {
        let deposited = self
            .deposits_of(depositor)
            .checked_add(amount)
            .ok_or_else(|| CrowdsaleError::overflow("vault deposit"))?;
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| CrowdsaleError::overflow("vault balance"))?;

        self.deposits.insert(depositor.clone(), deposited);
        self.balance = balance;
        Ok(deposited)
    }

    /// Undo a deposit recorded in the same operation.
    pub(crate) fn unrecord_deposit(&mut self, depositor: &Address, amount: Amount) {
        let remaining = self.deposits_of(depositor).saturating_sub(amount);
        if remaining == 0 {
            self.deposits.remove(depositor);
        } else {
            self.deposits.insert(depositor.clone(), remaining);
        }
        self.balance = self.balance.saturating_sub(amount);
    }

    /// Zero `depositor`'s mirrored deposit and release it from custody.
    ///
    /// Only possible while the gate is closed: once released, custody belongs to
    /// the owners' withdrawal workflow.
    pub(crate) fn refund_deposit(&mut self, depositor: &Address) -> CrowdsaleResult<Amount> {
        if self.released {
            return Err(CrowdsaleError::VaultReleased { vault: self.id });
        }
        let amount = self.deposits_of(depositor);
        if amount > self.balance {
            return Err(CrowdsaleError::Backend(format!(
                "{} holds {} but owes {} to {}",
                self.id, self.balance, amount, depositor
            )));
        }
        self.deposits.remove(depositor);
        self.balance -= amount;
        Ok(amount)
    }

    /// Put back a refunded deposit whose delivery failed.
    pub(crate) fn restore_deposit(&mut self, depositor: &Address, amount: Amount) {
        let restored = self.deposits_of(depositor).saturating_add(amount);
        self.deposits.insert(depositor.clone(), restored);
        self.balance = self.balance.saturating_add(amount);
    }

    // ── Release gate ─────────────────────────────────────────────────

    /// Open the release gate. One-way; consumes the key.
    pub(crate) fn release(&mut self, key: ReleaseKey) -> CrowdsaleResult<()> {
        if key.vault != self.id {
            return Err(CrowdsaleError::ForeignReleaseKey { vault: self.id });
        }
        self.released = true;
        info!(vault = %self.id, balance = self.balance, "Vault release gate opened");
        Ok(())
    }

    // ── Multisig workflow ────────────────────────────────────────────

    /// Append a withdrawal request. The submitter counts as its first
    /// confirmation, so a 1-of-M vault executes on submission.
    pub(crate) fn submit_transaction(
        &mut self,
        caller: &Address,
        destination: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> CrowdsaleResult<Confirmation> {
        self.ensure_owner(caller)?;
        self.ensure_released()?;

        if amount == 0 {
            return Err(CrowdsaleError::ZeroAmount);
        }
        if amount > self.balance {
            return Err(CrowdsaleError::AmountExceedsBalance {
                requested: amount,
                available: self.balance,
            });
        }

        let tx = TxIndex(self.transactions.len());
        self.transactions.push(VaultTransaction {
            destination: destination.clone(),
            amount,
            submitted_by: caller.clone(),
            confirmed_by: BTreeSet::from([caller.clone()]),
            status: TxStatus::Pending,
            submitted_at: now,
            executed_at: None,
        });

        debug!(
            vault = %self.id,
            tx = %tx,
            submitter = %caller,
            destination = %destination,
            amount = amount,
            "Vault transaction submitted"
        );

        let payout = if self.required <= 1 {
            Some(self.execute(tx, now))
        } else {
            None
        };

        Ok(Confirmation {
            tx,
            confirmations: 1,
            required: self.required,
            payout,
        })
    }

    /// Add `caller`'s confirmation, executing the transaction when the
    /// threshold is reached.
    pub(crate) fn confirm_transaction(
        &mut self,
        caller: &Address,
        tx: TxIndex,
        now: DateTime<Utc>,
    ) -> CrowdsaleResult<Confirmation> {
        self.ensure_owner(caller)?;
        self.ensure_released()?;

        let record = self.ensure_pending(tx)?;
        if record.confirmed_by.contains(caller) {
            return Err(CrowdsaleError::AlreadyConfirmed {
                vault: self.id,
                tx,
                owner: caller.clone(),
            });
        }

        let confirmations = record.confirmations() + 1;
        let reaches_threshold = confirmations >= self.required;
        // Execution must be possible before anything is committed.
        if reaches_threshold && record.amount > self.balance {
            return Err(CrowdsaleError::AmountExceedsBalance {
                requested: record.amount,
                available: self.balance,
            });
        }

        self.transactions[tx.0].confirmed_by.insert(caller.clone());
        debug!(
            vault = %self.id,
            tx = %tx,
            owner = %caller,
            confirmations = confirmations,
            required = self.required,
            "Vault transaction confirmed"
        );

        let payout = if reaches_threshold {
            Some(self.execute(tx, now))
        } else {
            None
        };

        Ok(Confirmation {
            tx,
            confirmations,
            required: self.required,
            payout,
        })
    }

    /// Commit the execution effects. Callers have checked status and balance.
    fn execute(&mut self, tx: TxIndex, now: DateTime<Utc>) -> Payout {
        let record = &mut self.transactions[tx.0];
        record.status = TxStatus::Executed;
        record.executed_at = Some(now);
        self.balance -= record.amount;

        info!(
            vault = %self.id,
            tx = %tx,
            destination = %record.destination,
            amount = record.amount,
            remaining = self.balance,
            "Vault transaction executed"
        );

        Payout {
            destination: record.destination.clone(),
            amount: record.amount,
            reason: PayoutReason::VaultExecution { vault: self.id, tx },
        }
    }

    // ── Rollback ─────────────────────────────────────────────────────

    /// Return an executed transaction to pending and put its amount back.
    pub(crate) fn revert_execution(&mut self, tx: TxIndex) {
        let Some(record) = self.transactions.get_mut(tx.0) else {
            return;
        };
        if record.status != TxStatus::Executed {
            return;
        }
        record.status = TxStatus::Pending;
        record.executed_at = None;
        self.balance = self.balance.saturating_add(record.amount);
        warn!(vault = %self.id, tx = %tx, "Vault execution reverted");
    }

    pub(crate) fn withdraw_confirmation(&mut self, tx: TxIndex, owner: &Address) {
        if let Some(record) = self.transactions.get_mut(tx.0) {
            record.confirmed_by.remove(owner);
        }
    }

    /// Roll back a submission and revert any execution.
    ///
    /// A record that is still the tail of the log is removed outright. One
    /// with later submissions behind it stays in place as an inert `Voided`
    /// entry so those indices keep pointing at the same requests.
    pub(crate) fn void_transaction(&mut self, tx: TxIndex) {
        self.revert_execution(tx);
        if tx.0 + 1 == self.transactions.len() {
            self.transactions.pop();
            debug!(vault = %self.id, tx = %tx, "Vault submission removed");
        } else if let Some(record) = self.transactions.get_mut(tx.0) {
            record.confirmed_by.clear();
            record.status = TxStatus::Voided;
            debug!(vault = %self.id, tx = %tx, "Vault submission voided");
        }
    }

    // ── Guards ───────────────────────────────────────────────────────

    fn ensure_owner(&self, caller: &Address) -> CrowdsaleResult<()> {
        if !self.is_owner(caller) {
            warn!(vault = %self.id, caller = %caller, "Non-owner attempted vault operation");
            return Err(CrowdsaleError::NotOwner {
                caller: caller.clone(),
                vault: self.id,
            });
        }
        Ok(())
    }

    fn ensure_released(&self) -> CrowdsaleResult<()> {
        if !self.released {
            return Err(CrowdsaleError::VaultLocked { vault: self.id });
        }
        Ok(())
    }

    fn ensure_pending(&self, tx: TxIndex) -> CrowdsaleResult<&VaultTransaction> {
        let record = self.transaction(tx)?;
        match record.status {
            TxStatus::Pending => Ok(record),
            TxStatus::Executed => Err(CrowdsaleError::AlreadyExecuted { vault: self.id, tx }),
            TxStatus::Voided => Err(CrowdsaleError::TransactionVoided { vault: self.id, tx }),
        }
    }
}
