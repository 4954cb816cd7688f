use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{Address, ProjectId, TxIndex, VaultId};
use crate::state::ProjectState;
use crate::Amount;

/// Failure taxonomy surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. Caller's fault, never retried automatically.
    Validation,
    /// Caller lacks the required capability.
    Authorization,
    /// Operation invalid for the entity's current lifecycle state.
    State,
    /// Reference to a nonexistent project, vault or transaction.
    NotFound,
    /// The value rail refused an outbound delivery; the operation was rolled back.
    Transfer,
    /// Engine bookkeeping failure (poisoned lock, inconsistent snapshot).
    Internal,
}

/// Errors from the crowdsale engine.
///
/// Every error aborts the whole operation with no partial state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrowdsaleError {
    // --- Validation errors ---
    #[error("funding goal must be greater than zero")]
    ZeroGoal,

    #[error("owner set must not be empty")]
    NoOwners,

    #[error("owner {0} appears more than once in the owner set")]
    DuplicateOwner(Address),

    #[error("required confirmations {required} outside [1, {owners}]")]
    InvalidThreshold { required: usize, owners: usize },

    #[error("owner set of {count} exceeds the limit of {limit}")]
    TooManyOwners { count: usize, limit: usize },

    #[error("campaign duration of {secs}s outside [{min}s, {max}s]")]
    InvalidDuration { secs: i64, min: i64, max: i64 },

    #[error("metadata of {len} bytes exceeds the limit of {limit}")]
    MetadataTooLarge { len: usize, limit: usize },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount {requested} exceeds vault balance {available}")]
    AmountExceedsBalance { requested: Amount, available: Amount },

    #[error("arithmetic overflow accumulating {context}")]
    AmountOverflow { context: String },

    #[error("nothing to refund for {backer} on {project}")]
    NothingToRefund { project: ProjectId, backer: Address },

    #[error("invalid configuration: {0}")]
    Config(String),

    // --- Authorization errors ---
    #[error("{caller} is not an owner of {vault}")]
    NotOwner { caller: Address, vault: VaultId },

    #[error("release key does not belong to {vault}")]
    ForeignReleaseKey { vault: VaultId },

    // --- State errors ---
    #[error("{project} is not open (state {state})")]
    ProjectNotOpen {
        project: ProjectId,
        state: ProjectState,
    },

    #[error("{project} stopped accepting contributions at {deadline} (now {now})")]
    DeadlinePassed {
        project: ProjectId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("{project} already finalized as {state}")]
    AlreadyFinalized {
        project: ProjectId,
        state: ProjectState,
    },

    #[error("{project} campaign runs until {deadline}; finalization not yet allowed")]
    CampaignStillOpen {
        project: ProjectId,
        deadline: DateTime<Utc>,
    },

    #[error("{project} is not refundable (state {state})")]
    NotRefundable {
        project: ProjectId,
        state: ProjectState,
    },

    #[error("{vault} is locked; withdrawals require a successful finalization")]
    VaultLocked { vault: VaultId },

    #[error("{vault} is released; deposits can no longer be refunded")]
    VaultReleased { vault: VaultId },

    #[error("{owner} already confirmed {tx} on {vault}")]
    AlreadyConfirmed {
        vault: VaultId,
        tx: TxIndex,
        owner: Address,
    },

    #[error("{tx} on {vault} already executed")]
    AlreadyExecuted { vault: VaultId, tx: TxIndex },

    #[error("{tx} on {vault} was voided")]
    TransactionVoided { vault: VaultId, tx: TxIndex },

    // --- Not found errors ---
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("vault not found: {0}")]
    VaultNotFound(VaultId),

    #[error("transaction {tx} not found on {vault}")]
    TransactionNotFound { vault: VaultId, tx: TxIndex },

    // --- Transfer errors ---
    #[error("delivery of {amount} to {destination} failed: {reason}")]
    TransferFailed {
        destination: Address,
        amount: Amount,
        reason: String,
    },

    // --- Internal errors ---
    #[error("backend error: {0}")]
    Backend(String),

    #[error("snapshot rejected: {0}")]
    CorruptSnapshot(String),
}

impl CrowdsaleError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        use CrowdsaleError::*;
        match self {
            ZeroGoal
            | NoOwners
            | DuplicateOwner(_)
            | InvalidThreshold { .. }
            | TooManyOwners { .. }
            | InvalidDuration { .. }
            | MetadataTooLarge { .. }
            | ZeroAmount
            | AmountExceedsBalance { .. }
            | AmountOverflow { .. }
            | NothingToRefund { .. }
            | Config(_) => ErrorKind::Validation,

            NotOwner { .. } | ForeignReleaseKey { .. } => ErrorKind::Authorization,

            ProjectNotOpen { .. }
            | DeadlinePassed { .. }
            | AlreadyFinalized { .. }
            | CampaignStillOpen { .. }
            | NotRefundable { .. }
            | VaultLocked { .. }
            | VaultReleased { .. }
            | AlreadyConfirmed { .. }
            | AlreadyExecuted { .. }
            | TransactionVoided { .. } => ErrorKind::State,

            ProjectNotFound(_) | VaultNotFound(_) | TransactionNotFound { .. } => {
                ErrorKind::NotFound
            }

            TransferFailed { .. } => ErrorKind::Transfer,

            Backend(_) | CorruptSnapshot(_) => ErrorKind::Internal,
        }
    }

    pub fn overflow(context: impl Into<String>) -> Self {
        Self::AmountOverflow {
            context: context.into(),
        }
    }
}

pub type CrowdsaleResult<T> = Result<T, CrowdsaleError>;
