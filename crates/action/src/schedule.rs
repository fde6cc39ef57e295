//! Provenance and deferred-start markers for actions.

use chrono::{DateTime, Utc};
use corral_core::ActionId;
use serde::{Deserialize, Serialize};

/// Why an action exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cause {
    /// Submitted directly by a caller through the service surface.
    Rpc,
    /// Spawned by another action during its execution.
    DerivedFrom {
        /// The parent action.
        action_id: ActionId,
    },
}

impl Cause {
    /// The parent action, if this action was derived from one.
    #[must_use]
    pub fn parent(&self) -> Option<ActionId> {
        match self {
            Self::Rpc => None,
            Self::DerivedFrom { action_id } => Some(*action_id),
        }
    }
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc => write!(f, "RPC request"),
            Self::DerivedFrom { action_id } => write!(f, "derived from {action_id}"),
        }
    }
}

/// When an action becomes eligible to start.
///
/// `After` is lowered onto a dependency edge at creation time; `When` is
/// persisted for custom handlers to interpret — the built-in dispatcher does
/// not evaluate conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Not before an absolute instant.
    At {
        /// The earliest start time.
        time: DateTime<Utc>,
    },
    /// After another action reaches a terminal state.
    After {
        /// The action to wait for.
        action_id: ActionId,
    },
    /// When a named condition holds.
    When {
        /// An opaque condition expression.
        condition: String,
    },
}

impl Schedule {
    /// Start at an absolute instant.
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::At { time }
    }

    /// Start after another action completes.
    #[must_use]
    pub fn after(action_id: ActionId) -> Self {
        Self::After { action_id }
    }

    /// Returns `true` if this marker permits starting at `now`.
    ///
    /// `After`/`When` markers answer `true` here: `After` is enforced via
    /// dependency edges, and `When` is delegated to custom handlers.
    #[must_use]
    pub fn permits_start(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::At { time } => *time <= now,
            Self::After { .. } | Self::When { .. } => true,
        }
    }
}
