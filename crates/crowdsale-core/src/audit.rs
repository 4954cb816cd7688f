use chrono::{DateTime, Utc};
use crowdsale_types::{
    Address, Amount, CrowdsaleError, CrowdsaleResult, ProjectId, ProjectState, TxIndex, VaultId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine transitions recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ProjectCreated {
        project: ProjectId,
        vault: VaultId,
        creator: Address,
        goal: Amount,
        deadline: DateTime<Utc>,
    },
    Funded {
        project: ProjectId,
        backer: Address,
        amount: Amount,
        raised: Amount,
    },
    Finalized {
        project: ProjectId,
        state: ProjectState,
        raised: Amount,
    },
    TransactionSubmitted {
        vault: VaultId,
        tx: TxIndex,
        submitter: Address,
        destination: Address,
        amount: Amount,
    },
    TransactionConfirmed {
        vault: VaultId,
        tx: TxIndex,
        owner: Address,
        confirmations: usize,
    },
    TransactionExecuted {
        vault: VaultId,
        tx: TxIndex,
        destination: Address,
        amount: Amount,
    },
    Refunded {
        project: ProjectId,
        backer: Address,
        amount: Amount,
    },
    /// A committed operation was undone because its outbound delivery failed.
    RolledBack { operation: String, reason: String },
    /// Delivery failed and the committed effects could not be undone.
    RollbackFailed {
        operation: String,
        reason: String,
        error: String,
    },
}

/// Hash-chained journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only journal of engine transitions with hash-chain proofs.
///
/// There is no mutation API besides `append`; tampering with a persisted
/// journal is caught by [`AuditJournal::verify_chain`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditJournal {
    enabled: bool,
    entries: Vec<AuditEntry>,
}

impl AuditJournal {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    /// Rebuild a journal from persisted entries, verifying the chain.
    pub fn from_entries(enabled: bool, entries: Vec<AuditEntry>) -> CrowdsaleResult<Self> {
        for (expected, entry) in entries.iter().enumerate() {
            if entry.index != expected as u64 {
                return Err(CrowdsaleError::CorruptSnapshot(format!(
                    "journal index gap at position {} (found {})",
                    expected, entry.index
                )));
            }
        }

        let journal = Self { enabled, entries };
        if !journal.verify_chain() {
            return Err(CrowdsaleError::CorruptSnapshot(
                "journal hash-chain verification failed".to_string(),
            ));
        }
        Ok(journal)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, event: AuditEvent, timestamp: DateTime<Utc>) {
        if !self.enabled {
            return;
        }

        let index = self.entries.len() as u64;
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(index, timestamp, &event, previous_hash.as_deref());

        self.entries.push(AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            timestamp,
            event,
            previous_hash,
            entry_hash,
        });
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected = compute_entry_hash(
                entry.index,
                entry.timestamp,
                &entry.event,
                previous_hash.as_deref(),
            );
            if entry.entry_hash != expected || entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }
}

fn compute_entry_hash(
    index: u64,
    timestamp: DateTime<Utc>,
    event: &AuditEvent,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "timestamp": timestamp,
        "event": event,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
