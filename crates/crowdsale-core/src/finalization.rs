use chrono::{DateTime, Utc};
use crowdsale_types::{Amount, CrowdsaleError, CrowdsaleResult, ProjectId, ProjectState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FinalizationConfig;
use crate::registry::ProjectEntry;

/// What a finalization decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationOutcome {
    pub project: ProjectId,
    pub state: ProjectState,
    pub raised: Amount,
    pub goal: Amount,
    /// Whether the vault release gate was opened.
    pub released: bool,
}

/// One-shot `Open → FinalizedSuccess | FinalizedFailure` transition.
#[derive(Debug, Clone, Default)]
pub struct FinalizationPolicy {
    require_deadline_passed: bool,
}

impl FinalizationPolicy {
    pub fn new(config: &FinalizationConfig) -> Self {
        Self {
            require_deadline_passed: config.require_deadline_passed,
        }
    }

    pub fn requires_deadline_passed(&self) -> bool {
        self.require_deadline_passed
    }

    /// Decide the terminal state from raised vs. goal and, on success, consume
    /// the project's release key to open its vault.
    pub(crate) fn finalize(
        &self,
        entry: &mut ProjectEntry,
        now: DateTime<Utc>,
    ) -> CrowdsaleResult<FinalizationOutcome> {
        let project = &entry.project;
        if project.state.is_terminal() {
            return Err(CrowdsaleError::AlreadyFinalized {
                project: project.id,
                state: project.state,
            });
        }
        if self.require_deadline_passed && now <= project.deadline {
            return Err(CrowdsaleError::CampaignStillOpen {
                project: project.id,
                deadline: project.deadline,
            });
        }

        let goal_reached = project.goal_reached();
        let next = project
            .state
            .finalize(goal_reached)
            .ok_or(CrowdsaleError::AlreadyFinalized {
                project: project.id,
                state: project.state,
            })?;

        if goal_reached {
            // Validate the key before consuming it so a failure leaves it in place.
            match entry.release_key.as_ref() {
                Some(key) if key.vault() == entry.vault.id() => {}
                Some(_) => {
                    return Err(CrowdsaleError::ForeignReleaseKey {
                        vault: entry.vault.id(),
                    })
                }
                None => {
                    return Err(CrowdsaleError::Backend(format!(
                        "{} has no release key for {}",
                        entry.project.id,
                        entry.vault.id()
                    )))
                }
            }
            if let Some(key) = entry.release_key.take() {
                entry.vault.release(key)?;
            }
        } else {
            // The gate can never open for a failed project.
            entry.release_key = None;
        }
        entry.project.state = next;

        let outcome = FinalizationOutcome {
            project: entry.project.id,
            state: next,
            raised: entry.project.raised(),
            goal: entry.project.goal,
            released: entry.vault.is_released(),
        };

        info!(
            project = %outcome.project,
            state = %outcome.state,
            raised = outcome.raised,
            goal = outcome.goal,
            "Project finalized"
        );
        Ok(outcome)
    }
}
