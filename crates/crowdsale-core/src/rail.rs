//! Native value rail: outbound transfers out of engine custody.
//!
//! The execution environment owns value custody. The engine only asks the rail
//! to deliver a [`Payout`] once every "already paid" effect has been committed,
//! because delivery may call straight back into the engine.

use crowdsale_types::{Address, Amount, ProjectId, TxIndex, VaultId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Why value is leaving custody.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutReason {
    /// A vault transaction reached its confirmation threshold.
    VaultExecution { vault: VaultId, tx: TxIndex },
    /// A backer reclaimed a contribution from a failed project.
    Refund { project: ProjectId },
}

/// An outbound transfer of value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub destination: Address,
    pub amount: Amount,
    pub reason: PayoutReason,
}

/// Delivery failures reported by the rail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RailError {
    #[error("recipient {0} refused delivery")]
    Refused(Address),

    #[error("rail unavailable: {0}")]
    Unavailable(String),
}

/// Outbound native transfer.
///
/// Implementations may invoke arbitrary recipient code, which may in turn call
/// back into the engine before `deliver` returns.
pub trait ValueRail: Send + Sync {
    fn deliver(&self, payout: &Payout) -> Result<(), RailError>;
}

/// Recipient code run on delivery. Returning an error refuses the value.
pub type RecipientHook = Arc<dyn Fn(&Payout) -> Result<(), RailError> + Send + Sync>;

/// In-memory rail that credits recipients and records every delivery.
///
/// Recipients can install a hook that runs before the value is credited,
/// which is how tests model re-entrant or refusing destinations.
#[derive(Default)]
pub struct InMemoryRail {
    balances: RwLock<HashMap<Address, Amount>>,
    deliveries: RwLock<Vec<Payout>>,
    hooks: RwLock<HashMap<Address, RecipientHook>>,
}

impl InMemoryRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install recipient code for `address`.
    pub fn on_delivery(&self, address: Address, hook: RecipientHook) {
        let mut hooks = self.hooks.write().unwrap_or_else(|p| p.into_inner());
        hooks.insert(address, hook);
    }

    pub fn clear_hook(&self, address: &Address) {
        let mut hooks = self.hooks.write().unwrap_or_else(|p| p.into_inner());
        hooks.remove(address);
    }

    /// Total value credited to `address` by this rail.
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn deliveries(&self) -> Vec<Payout> {
        self.deliveries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn total_delivered(&self) -> Amount {
        self.deliveries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|p| p.amount)
            .sum()
    }
}

impl ValueRail for InMemoryRail {
    fn deliver(&self, payout: &Payout) -> Result<(), RailError> {
        // Hook runs without any rail lock held so it can re-enter freely.
        let hook = self
            .hooks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&payout.destination)
            .cloned();
        if let Some(hook) = hook {
            hook(payout)?;
        }

        {
            let mut balances = self.balances.write().unwrap_or_else(|p| p.into_inner());
            let balance = balances.entry(payout.destination.clone()).or_insert(0);
            *balance = balance
                .checked_add(payout.amount)
                .ok_or_else(|| RailError::Unavailable("recipient balance overflow".into()))?;
        }
        self.deliveries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(payout.clone());
        Ok(())
    }
}
