//! Typed references to the entity an action mutates.

use corral_core::{ClusterId, NodeId, PolicyId};
use serde::{Deserialize, Serialize};

/// The entity an action operates on.
///
/// A policy-family action addresses a (cluster, policy) binding and must
/// carry both identifiers; its mutual exclusion is against the owning
/// cluster, which is why [`ActionTarget::lock_key`] folds the binding
/// variant onto the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTarget {
    /// A cluster aggregate.
    Cluster {
        /// The target cluster.
        cluster_id: ClusterId,
    },
    /// A single node.
    Node {
        /// The target node.
        node_id: NodeId,
    },
    /// A cluster-policy binding.
    ClusterPolicy {
        /// The cluster side of the binding.
        cluster_id: ClusterId,
        /// The policy side of the binding.
        policy_id: PolicyId,
    },
}

impl ActionTarget {
    /// Target a cluster.
    #[must_use]
    pub fn cluster(cluster_id: ClusterId) -> Self {
        Self::Cluster { cluster_id }
    }

    /// Target a node.
    #[must_use]
    pub fn node(node_id: NodeId) -> Self {
        Self::Node { node_id }
    }

    /// Target a cluster-policy binding.
    #[must_use]
    pub fn cluster_policy(cluster_id: ClusterId, policy_id: PolicyId) -> Self {
        Self::ClusterPolicy {
            cluster_id,
            policy_id,
        }
    }

    /// The cluster this target belongs to, if any.
    #[must_use]
    pub fn cluster_id(&self) -> Option<ClusterId> {
        match self {
            Self::Cluster { cluster_id } | Self::ClusterPolicy { cluster_id, .. } => {
                Some(*cluster_id)
            }
            Self::Node { .. } => None,
        }
    }

    /// The mutual-exclusion key for this target.
    ///
    /// Binding targets lock the owning cluster: enabling a policy and
    /// scaling the same cluster must not interleave.
    #[must_use]
    pub fn lock_key(&self) -> String {
        match self {
            Self::Cluster { cluster_id } | Self::ClusterPolicy { cluster_id, .. } => {
                format!("cluster/{cluster_id}")
            }
            Self::Node { node_id } => format!("node/{node_id}"),
        }
    }
}

impl std::fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cluster { cluster_id } => write!(f, "cluster {cluster_id}"),
            Self::Node { node_id } => write!(f, "node {node_id}"),
            Self::ClusterPolicy {
                cluster_id,
                policy_id,
            } => write!(f, "policy {policy_id} on cluster {cluster_id}"),
        }
    }
}
