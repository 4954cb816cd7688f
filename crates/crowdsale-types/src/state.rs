use serde::{Deserialize, Serialize};

/// Project lifecycle.
///
/// `Open` moves exactly once to one of the two terminal states; nothing leaves
/// a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    /// Accepting contributions until the deadline.
    Open,
    /// Goal reached; the vault's release gate is open.
    FinalizedSuccess,
    /// Goal missed; backers may reclaim their contributions.
    FinalizedFailure,
}

impl ProjectState {
    pub fn is_open(&self) -> bool {
        matches!(self, ProjectState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Forward-only transition function.
    ///
    /// Returns the terminal state an `Open` project moves to, or `None` when the
    /// project is already terminal.
    pub fn finalize(self, goal_reached: bool) -> Option<ProjectState> {
        match self {
            ProjectState::Open if goal_reached => Some(ProjectState::FinalizedSuccess),
            ProjectState::Open => Some(ProjectState::FinalizedFailure),
            ProjectState::FinalizedSuccess | ProjectState::FinalizedFailure => None,
        }
    }
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProjectState::Open => "open",
            ProjectState::FinalizedSuccess => "finalized-success",
            ProjectState::FinalizedFailure => "finalized-failure",
        };
        write!(f, "{}", label)
    }
}
