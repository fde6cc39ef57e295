//! Status enums for cluster and node aggregates.

use serde::{Deserialize, Serialize};

/// The lifecycle status of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Created but not yet provisioned.
    Init,
    /// All members provisioned and healthy.
    Active,
    /// A mutating action is in flight.
    Updating,
    /// The last action against this cluster failed.
    Error,
    /// Soft-deleted by a terminal delete action.
    Deleted,
}

impl ClusterStatus {
    /// Returns `true` if the cluster has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Returns `true` if the cluster can accept new mutating actions.
    #[must_use]
    pub fn is_operable(&self) -> bool {
        matches!(self, Self::Init | Self::Active | Self::Updating)
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Active => write!(f, "active"),
            Self::Updating => write!(f, "updating"),
            Self::Error => write!(f, "error"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// The lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Created but not yet provisioned.
    Init,
    /// Provisioned and serving.
    Active,
    /// A mutating action is in flight.
    Updating,
    /// The last action against this node failed.
    Error,
    /// Soft-deleted by a terminal delete action.
    Deleted,
}

impl NodeStatus {
    /// Returns `true` if the node has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Returns `true` if the node can join a cluster.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Active => write!(f, "active"),
            Self::Updating => write!(f, "updating"),
            Self::Error => write!(f, "error"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}
