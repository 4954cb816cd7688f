//! Serializable engine state with integrity checks on restore.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use crowdsale_types::{CrowdsaleError, CrowdsaleResult, ProjectId, ProjectState};
use serde::{Deserialize, Serialize};

use crate::audit::AuditJournal;
use crate::registry::{Project, ProjectEntry, ProjectRegistry};
use crate::vault::{EscrowVault, ReleaseKey};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A project together with its bound vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project: Project,
    pub vault: EscrowVault,
}

/// Point-in-time copy of the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub format_version: u32,
    pub taken_at: DateTime<Utc>,
    pub next_project_id: ProjectId,
    pub projects: Vec<ProjectRecord>,
    pub journal: AuditJournal,
}

impl StateSnapshot {
    pub(crate) fn capture(
        registry: &ProjectRegistry,
        journal: &AuditJournal,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            taken_at,
            next_project_id: registry.next_id(),
            projects: registry
                .entries()
                .map(|entry| ProjectRecord {
                    project: entry.project.clone(),
                    vault: entry.vault.clone(),
                })
                .collect(),
            journal: journal.clone(),
        }
    }

    pub fn to_json(&self) -> CrowdsaleResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CrowdsaleError::Backend(e.to_string()))
    }

    pub fn from_json(json: &str) -> CrowdsaleResult<Self> {
        serde_json::from_str(json).map_err(|e| CrowdsaleError::CorruptSnapshot(e.to_string()))
    }

    /// Verify every cross-record invariant and rebuild live state.
    ///
    /// Release keys are re-issued only for projects that are still open.
    pub(crate) fn into_state(self) -> CrowdsaleResult<(ProjectRegistry, AuditJournal)> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if self.next_project_id != ProjectId(self.projects.len() as u64) {
            return Err(corrupt(format!(
                "next project id {} does not follow {} projects",
                self.next_project_id,
                self.projects.len()
            )));
        }

        let mut vaults = HashSet::new();
        let mut entries = Vec::with_capacity(self.projects.len());
        for (position, record) in self.projects.into_iter().enumerate() {
            if record.project.id != ProjectId(position as u64) {
                return Err(corrupt(format!(
                    "project id gap at position {} (found {})",
                    position, record.project.id
                )));
            }
            if !vaults.insert(record.vault.id()) {
                return Err(corrupt(format!("{} bound to two projects", record.vault.id())));
            }
            verify_record(&record)?;

            let release_key = record
                .project
                .state
                .is_open()
                .then(|| ReleaseKey::reissue(record.vault.id()));
            entries.push(ProjectEntry {
                project: record.project,
                vault: record.vault,
                release_key,
            });
        }

        let journal = AuditJournal::from_entries(
            self.journal.is_enabled(),
            self.journal.entries().to_vec(),
        )?;
        Ok((
            ProjectRegistry::from_parts(entries, self.next_project_id),
            journal,
        ))
    }
}

fn corrupt(reason: String) -> CrowdsaleError {
    CrowdsaleError::CorruptSnapshot(reason)
}

fn verify_record(record: &ProjectRecord) -> CrowdsaleResult<()> {
    let ProjectRecord { project, vault } = record;
    let id = project.id;

    if project.vault != vault.id() {
        return Err(corrupt(format!(
            "{} references {} but carries {}",
            id,
            project.vault,
            vault.id()
        )));
    }
    if !project.ledger.is_conserved() {
        return Err(corrupt(format!("{} raised total differs from its contributions", id)));
    }
    if vault.deposits() != project.ledger.contributions() {
        return Err(corrupt(format!("{} deposits do not mirror contributions", id)));
    }
    if vault.owners() != project.owners.as_slice()
        || vault.required() != project.required_confirmations
    {
        return Err(corrupt(format!("{} owner set differs from its vault", id)));
    }
    if project.required_confirmations == 0
        || project.required_confirmations > project.owners.len()
    {
        return Err(corrupt(format!("{} threshold out of range", id)));
    }
    if vault.is_released() != (project.state == ProjectState::FinalizedSuccess) {
        return Err(corrupt(format!(
            "{} release gate does not match state {}",
            id, project.state
        )));
    }
    if project.state == ProjectState::FinalizedSuccess && !project.goal_reached() {
        return Err(corrupt(format!(
            "{} finalized as success with {} raised against a goal of {}",
            id,
            project.raised(),
            project.goal
        )));
    }
    if vault.balance().checked_add(vault.total_withdrawn()) != Some(project.raised()) {
        return Err(corrupt(format!(
            "{} holds {} with {} withdrawn but raised {}",
            id,
            vault.balance(),
            vault.total_withdrawn(),
            project.raised()
        )));
    }

    if !vault.is_released() && vault.transaction_count() > 0 {
        return Err(corrupt(format!("{} has transactions on a locked vault", id)));
    }
    for (index, tx) in vault.transactions().iter().enumerate() {
        if tx.confirmed_by.iter().any(|owner| !vault.is_owner(owner)) {
            return Err(corrupt(format!("{} tx#{} confirmed by a non-owner", id, index)));
        }
        if tx.is_executed() && tx.confirmations() < vault.required() {
            return Err(corrupt(format!("{} tx#{} executed below threshold", id, index)));
        }
    }
    Ok(())
}
