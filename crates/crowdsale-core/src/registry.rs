use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use crowdsale_types::{
    Address, Amount, CrowdsaleError, CrowdsaleResult, ProjectId, ProjectState, VaultId,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProjectLimits;
use crate::ledger::FundingLedger;
use crate::vault::{EscrowVault, ReleaseKey};

/// Terms a creator submits when registering a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectTerms {
    pub goal: Amount,
    /// Opaque descriptive payload (name, description or content hash).
    pub metadata: String,
    pub owners: Vec<Address>,
    pub required_confirmations: usize,
    pub duration: Duration,
}

impl ProjectTerms {
    pub fn new(
        goal: Amount,
        owners: Vec<Address>,
        required_confirmations: usize,
        duration: Duration,
    ) -> Self {
        Self {
            goal,
            metadata: String::new(),
            owners,
            required_confirmations,
            duration,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

/// A fundraising project and its contribution ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub creator: Address,
    pub goal: Amount,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub metadata: String,
    pub owners: Vec<Address>,
    pub required_confirmations: usize,
    pub state: ProjectState,
    pub vault: VaultId,
    pub ledger: FundingLedger,
}

impl Project {
    pub fn raised(&self) -> Amount {
        self.ledger.raised()
    }

    pub fn goal_reached(&self) -> bool {
        self.ledger.raised() >= self.goal
    }
}

/// Read-only project view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub goal: Amount,
    pub raised: Amount,
    pub metadata: String,
    pub vault: VaultId,
    pub state: ProjectState,
    pub deadline: DateTime<Utc>,
    pub owners: Vec<Address>,
    pub required_confirmations: usize,
    pub backers: usize,
}

impl From<&Project> for ProjectSnapshot {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            goal: project.goal,
            raised: project.raised(),
            metadata: project.metadata.clone(),
            vault: project.vault,
            state: project.state,
            deadline: project.deadline,
            owners: project.owners.clone(),
            required_confirmations: project.required_confirmations,
            backers: project.ledger.backer_count(),
        }
    }
}

/// A project bound to its exclusively-owned vault.
///
/// The release key stays here until finalization consumes it, so only the
/// owning project can open its vault's gate.
#[derive(Debug)]
pub struct ProjectEntry {
    pub(crate) project: Project,
    pub(crate) vault: EscrowVault,
    pub(crate) release_key: Option<ReleaseKey>,
}

impl ProjectEntry {
    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn vault(&self) -> &EscrowVault {
        &self.vault
    }
}

/// Project table keyed by sequential id, with a vault → project index.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    entries: BTreeMap<ProjectId, ProjectEntry>,
    vault_index: HashMap<VaultId, ProjectId>,
    next_id: ProjectId,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from already-verified parts.
    pub(crate) fn from_parts(entries: Vec<ProjectEntry>, next_id: ProjectId) -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
            vault_index: HashMap::new(),
            next_id,
        };
        for entry in entries {
            registry
                .vault_index
                .insert(entry.vault.id(), entry.project.id);
            registry.entries.insert(entry.project.id, entry);
        }
        registry
    }

    /// Register a project and atomically open its locked vault.
    pub fn create(
        &mut self,
        creator: &Address,
        terms: ProjectTerms,
        now: DateTime<Utc>,
        limits: &ProjectLimits,
    ) -> CrowdsaleResult<ProjectId> {
        if terms.goal == 0 {
            return Err(CrowdsaleError::ZeroGoal);
        }
        if terms.owners.len() > limits.max_owners {
            return Err(CrowdsaleError::TooManyOwners {
                count: terms.owners.len(),
                limit: limits.max_owners,
            });
        }
        if terms.metadata.len() > limits.max_metadata_bytes {
            return Err(CrowdsaleError::MetadataTooLarge {
                len: terms.metadata.len(),
                limit: limits.max_metadata_bytes,
            });
        }

        let secs = terms.duration.num_seconds();
        let invalid_duration = || CrowdsaleError::InvalidDuration {
            secs,
            min: limits.min_duration_secs,
            max: limits.max_duration_secs,
        };
        if secs < limits.min_duration_secs || secs > limits.max_duration_secs {
            return Err(invalid_duration());
        }
        let deadline = now
            .checked_add_signed(terms.duration)
            .ok_or_else(invalid_duration)?;

        let (vault, release_key) =
            EscrowVault::open(terms.owners.clone(), terms.required_confirmations)?;

        let id = self.next_id;
        let project = Project {
            id,
            creator: creator.clone(),
            goal: terms.goal,
            deadline,
            created_at: now,
            metadata: terms.metadata,
            owners: terms.owners,
            required_confirmations: terms.required_confirmations,
            state: ProjectState::Open,
            vault: vault.id(),
            ledger: FundingLedger::new(),
        };

        info!(
            project = %id,
            vault = %vault.id(),
            creator = %creator,
            goal = project.goal,
            owners = project.owners.len(),
            required = project.required_confirmations,
            deadline = %deadline,
            "Project created"
        );

        self.vault_index.insert(vault.id(), id);
        self.entries.insert(
            id,
            ProjectEntry {
                project,
                vault,
                release_key: Some(release_key),
            },
        );
        self.next_id = id.next();
        Ok(id)
    }

    pub fn entry(&self, id: ProjectId) -> CrowdsaleResult<&ProjectEntry> {
        self.entries
            .get(&id)
            .ok_or(CrowdsaleError::ProjectNotFound(id))
    }

    pub(crate) fn entry_mut(&mut self, id: ProjectId) -> CrowdsaleResult<&mut ProjectEntry> {
        self.entries
            .get_mut(&id)
            .ok_or(CrowdsaleError::ProjectNotFound(id))
    }

    pub fn project_for_vault(&self, vault: &VaultId) -> CrowdsaleResult<ProjectId> {
        self.vault_index
            .get(vault)
            .copied()
            .ok_or(CrowdsaleError::VaultNotFound(*vault))
    }

    pub fn vault(&self, vault: &VaultId) -> CrowdsaleResult<&EscrowVault> {
        let id = self.project_for_vault(vault)?;
        Ok(&self.entry(id)?.vault)
    }

    pub(crate) fn vault_entry_mut(
        &mut self,
        vault: &VaultId,
    ) -> CrowdsaleResult<&mut ProjectEntry> {
        let id = self.project_for_vault(vault)?;
        self.entry_mut(id)
    }

    pub fn snapshot(&self, id: ProjectId) -> CrowdsaleResult<ProjectSnapshot> {
        Ok(ProjectSnapshot::from(&self.entry(id)?.project))
    }

    pub fn goal_reached(&self, id: ProjectId) -> CrowdsaleResult<bool> {
        Ok(self.entry(id)?.project.goal_reached())
    }

    /// Contribution of `backer`; zero for unknown backers, error for unknown projects.
    pub fn backer_funds(&self, id: ProjectId, backer: &Address) -> CrowdsaleResult<Amount> {
        Ok(self.entry(id)?.project.ledger.contribution_of(backer))
    }

    pub fn ids(&self) -> Vec<ProjectId> {
        self.entries.keys().copied().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_id(&self) -> ProjectId {
        self.next_id
    }
}
