use crate::domain::{ReleaseLine, Version};

/// Publishing state derived from the currently checked-out branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    /// HEAD is on `release-<line>-X.Y`; only the series `X.Y` is carried.
    OnReleaseBranch { series: Version },
    /// Any other branch, including a detached HEAD.
    OnMainline,
}

/// Represents the current git branch in the context of one release line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub name: String,
    pub state: ReleaseState,
}

impl BranchContext {
    /// Classify a branch name for the given release line
    pub fn new(name: impl Into<String>, line: &ReleaseLine) -> Self {
        let name = name.into();
        let state = match line.parse_branch(&name) {
            Some(series) => ReleaseState::OnReleaseBranch { series },
            None => ReleaseState::OnMainline,
        };

        BranchContext { name, state }
    }

    /// Check if this is a release branch of the line
    pub fn is_release_branch(&self) -> bool {
        matches!(self.state, ReleaseState::OnReleaseBranch { .. })
    }
}
