//! The per-(cluster, policy) attachment record.

use chrono::{DateTime, Utc};
use corral_core::{ClusterId, PolicyId};
use serde::{Deserialize, Serialize};

/// Runtime binding state for a policy attached to a cluster.
///
/// A policy object is immutable and shared across clusters; everything that
/// varies per attachment — cooldown override, evaluation priority, the
/// enabled flag, and the `last_op` timestamp the cooldown check reads —
/// lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBinding {
    /// The cluster this binding belongs to.
    pub cluster_id: ClusterId,
    /// The attached policy.
    pub policy_id: PolicyId,
    /// Per-cluster cooldown override in seconds; `None` uses the policy's own.
    #[serde(default)]
    pub cooldown_override: Option<i64>,
    /// Evaluation priority; lower runs earlier. Ties break by attachment order.
    pub priority: i32,
    /// Disabled bindings are skipped by the hook pipeline.
    pub enabled: bool,
    /// When a policy-triggered operation last completed on this binding.
    #[serde(default)]
    pub last_op: Option<DateTime<Utc>>,
    /// When the policy was attached.
    pub attached_at: DateTime<Utc>,
}

impl PolicyBinding {
    /// Create a new enabled binding with default priority.
    #[must_use]
    pub fn new(cluster_id: ClusterId, policy_id: PolicyId) -> Self {
        Self {
            cluster_id,
            policy_id,
            cooldown_override: None,
            priority: 0,
            enabled: true,
            last_op: None,
            attached_at: Utc::now(),
        }
    }

    /// Set a per-cluster cooldown override.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: i64) -> Self {
        self.cooldown_override = Some(cooldown);
        self
    }

    /// Set the evaluation priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The cooldown to enforce, given the policy's own default.
    #[must_use]
    pub fn effective_cooldown(&self, policy_default: i64) -> i64 {
        self.cooldown_override.unwrap_or(policy_default)
    }

    /// Stamp `last_op` to now, re-arming the cooldown window.
    pub fn touch(&mut self) {
        self.last_op = Some(Utc::now());
    }
}
