//! The closed set of action kinds.

use serde::{Deserialize, Serialize};

/// The family an action kind belongs to, determining which target type it
/// accepts and which handler table serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFamily {
    /// Operations against a cluster aggregate.
    Cluster,
    /// Operations against a single node.
    Node,
    /// Operations against a cluster-policy binding.
    Policy,
    /// User-defined operations outside the built-in families.
    Custom,
}

/// Every operation the engine knows how to execute.
///
/// Serialized in the wire spelling (`CLUSTER_SCALE_OUT`, …) so persisted
/// records match the operation names callers submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Provision a cluster and its initial members.
    ClusterCreate,
    /// Soft-delete a cluster after draining its members.
    ClusterDelete,
    /// Re-profile every member of a cluster.
    ClusterUpdate,
    /// Adopt existing nodes into a cluster.
    ClusterAddNodes,
    /// Evict named nodes from a cluster.
    ClusterDelNodes,
    /// Shrink a cluster by a computed or requested count.
    ClusterScaleIn,
    /// Grow a cluster by a computed or requested count.
    ClusterScaleOut,
    /// Attach a governance policy to a cluster.
    ClusterAttachPolicy,
    /// Detach a governance policy from a cluster.
    ClusterDetachPolicy,
    /// Provision a single node.
    NodeCreate,
    /// Soft-delete a single node.
    NodeDelete,
    /// Re-profile a single node.
    NodeUpdate,
    /// Bind an orphan node to a cluster.
    NodeJoinCluster,
    /// Detach a node from its cluster.
    NodeLeaveCluster,
    /// Enable a cluster-policy binding.
    PolicyEnable,
    /// Disable a cluster-policy binding.
    PolicyDisable,
    /// Update a binding's override fields.
    PolicyUpdate,
    /// Pluggable custom operation.
    ActionExecute,
}

impl ActionKind {
    /// All kinds, in declaration order. Used by the handler registry to
    /// verify completeness at startup.
    pub const ALL: [Self; 18] = [
        Self::ClusterCreate,
        Self::ClusterDelete,
        Self::ClusterUpdate,
        Self::ClusterAddNodes,
        Self::ClusterDelNodes,
        Self::ClusterScaleIn,
        Self::ClusterScaleOut,
        Self::ClusterAttachPolicy,
        Self::ClusterDetachPolicy,
        Self::NodeCreate,
        Self::NodeDelete,
        Self::NodeUpdate,
        Self::NodeJoinCluster,
        Self::NodeLeaveCluster,
        Self::PolicyEnable,
        Self::PolicyDisable,
        Self::PolicyUpdate,
        Self::ActionExecute,
    ];

    /// The family this kind belongs to.
    #[must_use]
    pub fn family(&self) -> ActionFamily {
        match self {
            Self::ClusterCreate
            | Self::ClusterDelete
            | Self::ClusterUpdate
            | Self::ClusterAddNodes
            | Self::ClusterDelNodes
            | Self::ClusterScaleIn
            | Self::ClusterScaleOut
            | Self::ClusterAttachPolicy
            | Self::ClusterDetachPolicy => ActionFamily::Cluster,
            Self::NodeCreate
            | Self::NodeDelete
            | Self::NodeUpdate
            | Self::NodeJoinCluster
            | Self::NodeLeaveCluster => ActionFamily::Node,
            Self::PolicyEnable | Self::PolicyDisable | Self::PolicyUpdate => ActionFamily::Policy,
            Self::ActionExecute => ActionFamily::Custom,
        }
    }

    /// Returns `true` for the two scaling kinds the scaling policy watches.
    #[must_use]
    pub fn is_scale(&self) -> bool {
        matches!(self, Self::ClusterScaleIn | Self::ClusterScaleOut)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ClusterCreate => "CLUSTER_CREATE",
            Self::ClusterDelete => "CLUSTER_DELETE",
            Self::ClusterUpdate => "CLUSTER_UPDATE",
            Self::ClusterAddNodes => "CLUSTER_ADD_NODES",
            Self::ClusterDelNodes => "CLUSTER_DEL_NODES",
            Self::ClusterScaleIn => "CLUSTER_SCALE_IN",
            Self::ClusterScaleOut => "CLUSTER_SCALE_OUT",
            Self::ClusterAttachPolicy => "CLUSTER_ATTACH_POLICY",
            Self::ClusterDetachPolicy => "CLUSTER_DETACH_POLICY",
            Self::NodeCreate => "NODE_CREATE",
            Self::NodeDelete => "NODE_DELETE",
            Self::NodeUpdate => "NODE_UPDATE",
            Self::NodeJoinCluster => "NODE_JOIN_CLUSTER",
            Self::NodeLeaveCluster => "NODE_LEAVE_CLUSTER",
            Self::PolicyEnable => "POLICY_ENABLE",
            Self::PolicyDisable => "POLICY_DISABLE",
            Self::PolicyUpdate => "POLICY_UPDATE",
            Self::ActionExecute => "ACTION_EXECUTE",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_partition_covers_all_kinds() {
        let mut cluster = 0;
        let mut node = 0;
        let mut policy = 0;
        let mut custom = 0;
        for kind in ActionKind::ALL {
            match kind.family() {
                ActionFamily::Cluster => cluster += 1,
                ActionFamily::Node => node += 1,
                ActionFamily::Policy => policy += 1,
                ActionFamily::Custom => custom += 1,
            }
        }
        assert_eq!((cluster, node, policy, custom), (9, 5, 3, 1));
    }

    #[test]
    fn scale_kinds() {
        assert!(ActionKind::ClusterScaleIn.is_scale());
        assert!(ActionKind::ClusterScaleOut.is_scale());
        assert!(!ActionKind::ClusterCreate.is_scale());
        assert!(!ActionKind::NodeCreate.is_scale());
    }

    #[test]
    fn display_uses_wire_spelling() {
        assert_eq!(ActionKind::ClusterScaleOut.to_string(), "CLUSTER_SCALE_OUT");
        assert_eq!(ActionKind::NodeJoinCluster.to_string(), "NODE_JOIN_CLUSTER");
        assert_eq!(ActionKind::ActionExecute.to_string(), "ACTION_EXECUTE");
    }

    #[test]
    fn serde_matches_display() {
        for kind in ActionKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
            let back: ActionKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
