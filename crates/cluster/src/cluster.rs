//! The cluster aggregate.

use chrono::{DateTime, Utc};
use corral_core::{ClusterId, NodeId, ProfileId};
use serde::{Deserialize, Serialize};

use crate::status::ClusterStatus;

/// A managed group of nodes sharing a profile.
///
/// `desired_size` is the size the cluster is converging toward; the observed
/// size is the length of `nodes`. `max_size` of `None` means the engine-wide
/// default limit applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique cluster identifier.
    pub id: ClusterId,
    /// Human-readable name.
    pub name: String,
    /// Profile every member is built from.
    pub profile_id: ProfileId,
    /// Current lifecycle status.
    pub status: ClusterStatus,
    /// Reason for the current status, if any.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Size the cluster is converging toward.
    pub desired_size: u32,
    /// Lower size bound enforced by scaling validation.
    pub min_size: u32,
    /// Upper size bound; `None` defers to the engine-wide default.
    #[serde(default)]
    pub max_size: Option<u32>,
    /// Current member node IDs.
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    /// When the cluster record was created.
    pub created_at: DateTime<Utc>,
    /// When the cluster record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When the cluster was soft-deleted.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Cluster {
    /// Create a new cluster in the `Init` state.
    #[must_use]
    pub fn new(name: impl Into<String>, profile_id: ProfileId, desired_size: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ClusterId::v4(),
            name: name.into(),
            profile_id,
            status: ClusterStatus::Init,
            status_reason: None,
            desired_size,
            min_size: 0,
            max_size: None,
            nodes: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Set the size bounds.
    #[must_use]
    pub fn with_limits(mut self, min_size: u32, max_size: Option<u32>) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    /// Observed size: the number of current members.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Returns `true` if the given node is a member.
    #[must_use]
    pub fn has_member(&self, node_id: NodeId) -> bool {
        self.nodes.contains(&node_id)
    }

    /// Transition to a new status, recording the reason.
    pub fn set_status(&mut self, status: ClusterStatus, reason: impl Into<String>) {
        self.status = status;
        self.status_reason = Some(reason.into());
        self.updated_at = Utc::now();
        if status == ClusterStatus::Deleted {
            self.deleted_at = Some(self.updated_at);
        }
    }

    /// Add a member node. Duplicate additions are no-ops.
    pub fn add_member(&mut self, node_id: NodeId) {
        if !self.nodes.contains(&node_id) {
            self.nodes.push(node_id);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a member node. Returns `true` if the node was a member.
    pub fn remove_member(&mut self, node_id: NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|&n| n != node_id);
        let removed = self.nodes.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }
}
