//! Action-level status tracking.

use serde::{Deserialize, Serialize};

/// The status of a durable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Created; fields still being filled in or dependencies being analyzed.
    Init,
    /// Blocked on at least one unfinished dependency.
    Waiting,
    /// Eligible for a worker to claim.
    Ready,
    /// Claimed and executing on a worker.
    Running,
    /// Completed with success.
    Succeeded,
    /// Completed with failure.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl ActionStatus {
    /// Returns `true` if the action has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if the action is still waiting to be claimed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Init | Self::Waiting | Self::Ready)
    }

    /// Returns `true` if the action completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
