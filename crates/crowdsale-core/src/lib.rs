//! # crowdsale-core
//!
//! Funding ledger and escrow authorization engine:
//!
//! - **Registry**: projects with a goal, deadline and owner set, each bound
//!   1:1 to a freshly opened escrow vault
//! - **Funding ledger**: per-backer cumulative contributions, forwarded into
//!   the bound vault's custody in the same step
//! - **Finalization**: one-shot `Open → FinalizedSuccess | FinalizedFailure`;
//!   success opens the vault's release gate
//! - **Refunds**: backers reclaim their own contribution after a failure
//! - **Escrow vault**: N-of-M owner confirmations gate every withdrawal
//!
//! ## Invariants
//!
//! - `raised == Σ contributions` for every project, at all times.
//! - Vault balance plus executed withdrawals equals `raised`.
//! - Effects are committed before any value leaves custody; a refused
//!   delivery rolls the operation back.
//!
//! The [`Crowdsale`] facade is the entry point. Time and outbound value come
//! from the [`Clock`] and [`ValueRail`] collaborators.

#![deny(unsafe_code)]

pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod finalization;
pub mod ledger;
pub mod rail;
pub mod refund;
pub mod registry;
pub mod snapshot;
pub mod vault;

pub use audit::{AuditEntry, AuditEvent, AuditJournal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuditConfig, CrowdsaleConfig, FinalizationConfig, ProjectLimits};
pub use engine::{Crowdsale, CrowdsaleStats, ExecutionStatus};
pub use finalization::{FinalizationOutcome, FinalizationPolicy};
pub use ledger::FundingLedger;
pub use rail::{InMemoryRail, Payout, PayoutReason, RailError, RecipientHook, ValueRail};
pub use refund::RefundEngine;
pub use registry::{Project, ProjectRegistry, ProjectSnapshot, ProjectTerms};
pub use snapshot::{ProjectRecord, StateSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use vault::{EscrowVault, ReleaseKey, TxStatus, VaultTransaction};

pub use crowdsale_types::{
    Address, Amount, CrowdsaleError, CrowdsaleResult, ErrorKind, ProjectId, ProjectState, TxIndex,
    VaultId,
};
