//! The node aggregate.

use chrono::{DateTime, Utc};
use corral_core::{ClusterId, NodeId, ProfileId};
use serde::{Deserialize, Serialize};

use crate::status::NodeStatus;

/// A single cluster member.
///
/// A node with `cluster_id` of `None` is an orphan: provisioned but not
/// owned by any cluster, eligible for `NODE_JOIN_CLUSTER`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Profile this node was built from.
    pub profile_id: ProfileId,
    /// Owning cluster, if any.
    #[serde(default)]
    pub cluster_id: Option<ClusterId>,
    /// Current lifecycle status.
    pub status: NodeStatus,
    /// Reason for the current status, if any.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// When the node record was created.
    pub created_at: DateTime<Utc>,
    /// When the node record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node in the `Init` state.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        profile_id: ProfileId,
        cluster_id: Option<ClusterId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::v4(),
            name: name.into(),
            profile_id,
            cluster_id,
            status: NodeStatus::Init,
            status_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, recording the reason.
    pub fn set_status(&mut self, status: NodeStatus, reason: impl Into<String>) {
        self.status = status;
        self.status_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Bind this node to a cluster.
    pub fn join(&mut self, cluster_id: ClusterId) {
        self.cluster_id = Some(cluster_id);
        self.updated_at = Utc::now();
    }

    /// Detach this node from its cluster. Returns the previous owner, if any.
    pub fn leave(&mut self) -> Option<ClusterId> {
        let prev = self.cluster_id.take();
        if prev.is_some() {
            self.updated_at = Utc::now();
        }
        prev
    }

    /// Returns `true` if the node is not owned by any cluster.
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        self.cluster_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_node_starts_init() {
        let node = Node::new("node-000", ProfileId::v4(), None);
        assert_eq!(node.status, NodeStatus::Init);
        assert!(node.is_orphan());
    }

    #[test]
    fn join_and_leave() {
        let cluster_id = ClusterId::v4();
        let mut node = Node::new("node-000", ProfileId::v4(), None);

        node.join(cluster_id);
        assert_eq!(node.cluster_id, Some(cluster_id));
        assert!(!node.is_orphan());

        assert_eq!(node.leave(), Some(cluster_id));
        assert!(node.is_orphan());
        assert_eq!(node.leave(), None);
    }

    #[test]
    fn set_status_records_reason() {
        let mut node = Node::new("node-000", ProfileId::v4(), None);
        node.set_status(NodeStatus::Active, "node creation");
        assert!(node.status.is_active());
        assert_eq!(node.status_reason.as_deref(), Some("node creation"));
    }

    #[test]
    fn serde_roundtrip() {
        let node = Node::new("node-001", ProfileId::v4(), Some(ClusterId::v4()));
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, node.id);
        assert_eq!(back.cluster_id, node.cluster_id);
    }
}
