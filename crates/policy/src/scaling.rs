//! The scaling policy: cooldown windows and capacity arithmetic.
//!
//! Enforced before the node count of a cluster changes. The BEFORE hook
//! runs only for the event the policy was configured to watch; the AFTER
//! hook runs for both scale directions so the cooldown window re-arms no
//! matter which way the cluster moved.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use corral_action::{Action, ActionKind, AdjustmentPlan, PolicyDecision};
use corral_core::{ClusterId, PolicyId};
use corral_storage::{PolicyRecord, StorageGateway};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PolicyError;
use crate::policy::{Policy, PolicyContext, PolicyPhase};

/// Registered type name for scaling policies.
pub const SCALING_POLICY_TYPE: &str = "corral.policy.scaling";

/// How the adjustment `number` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// `number` is the size the cluster should end up at.
    ExactCapacity,
    /// `number` is the delta to apply verbatim.
    ChangeInCapacity,
    /// `number` is a percentage of the current size, floored, with
    /// `min_step` as the lower bound.
    ChangeInPercentage,
}

fn default_number() -> i64 {
    1
}

fn default_min_step() -> i64 {
    1
}

/// The `adjustment` block of a scaling policy spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentSpec {
    /// Interpretation of `number`.
    #[serde(rename = "type", default = "AdjustmentSpec::default_type")]
    pub adjustment_type: AdjustmentType,
    /// The adjustment quantity; semantics depend on the type.
    #[serde(default = "default_number")]
    pub number: i64,
    /// Floor applied to percentage-based adjustments.
    #[serde(default = "default_min_step")]
    pub min_step: i64,
    /// Clamp to the nearest feasible value instead of rejecting.
    #[serde(default)]
    pub best_effort: bool,
    /// Seconds to hold the cluster before it may be resized again.
    #[serde(default)]
    pub cooldown: i64,
}

impl AdjustmentSpec {
    fn default_type() -> AdjustmentType {
        AdjustmentType::ChangeInCapacity
    }
}

impl Default for AdjustmentSpec {
    fn default() -> Self {
        Self {
            adjustment_type: Self::default_type(),
            number: default_number(),
            min_step: default_min_step(),
            best_effort: false,
            cooldown: 0,
        }
    }
}

/// The full scaling policy spec document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSpec {
    /// Which scale event triggers the BEFORE check.
    pub event: ActionKind,
    /// Detailed adjustment parameters.
    #[serde(default)]
    pub adjustment: AdjustmentSpec,
}

/// Policy for changing the size of a cluster.
#[derive(Debug, Clone)]
pub struct ScalingPolicy {
    id: PolicyId,
    name: String,
    event: ActionKind,
    adjustment: AdjustmentSpec,
    target: Vec<(PolicyPhase, ActionKind)>,
}

impl ScalingPolicy {
    /// Default evaluation priority for new bindings.
    pub const PRIORITY: i32 = 100;

    /// Build a scaling policy from its stored record, validating the spec.
    pub fn from_record(record: &PolicyRecord) -> Result<Self, PolicyError> {
        let spec: ScalingSpec = serde_json::from_value(record.spec.clone())?;

        if !spec.event.is_scale() {
            return Err(PolicyError::InvalidSpec(format!(
                "'event' must be CLUSTER_SCALE_IN or CLUSTER_SCALE_OUT, got {}",
                spec.event
            )));
        }
        if spec.adjustment.number <= 0 {
            return Err(PolicyError::InvalidSpec(
                "the 'number' for 'adjustment' must be > 0".into(),
            ));
        }
        if spec.adjustment.min_step < 0 {
            return Err(PolicyError::InvalidSpec(
                "the 'min_step' for 'adjustment' must be >= 0".into(),
            ));
        }
        if spec.adjustment.cooldown < 0 {
            return Err(PolicyError::InvalidSpec(
                "the 'cooldown' for 'adjustment' must be >= 0".into(),
            ));
        }

        Ok(Self {
            id: record.id,
            name: record.name.clone(),
            event: spec.event,
            adjustment: spec.adjustment,
            target: vec![
                (PolicyPhase::Before, ActionKind::ClusterScaleIn),
                (PolicyPhase::Before, ActionKind::ClusterScaleOut),
                (PolicyPhase::After, ActionKind::ClusterScaleIn),
                (PolicyPhase::After, ActionKind::ClusterScaleOut),
            ],
        })
    }

    /// The scale event this policy reacts to on BEFORE.
    #[must_use]
    pub fn event(&self) -> ActionKind {
        self.event
    }

    /// The number of nodes to add or remove, given the current size.
    #[must_use]
    pub fn calculate_adjustment_count(&self, current_size: u32) -> i64 {
        let current = i64::from(current_size);
        match self.adjustment.adjustment_type {
            AdjustmentType::ExactCapacity => {
                if self.event == ActionKind::ClusterScaleIn {
                    current - self.adjustment.number
                } else {
                    self.adjustment.number - current
                }
            }
            AdjustmentType::ChangeInCapacity => self.adjustment.number,
            AdjustmentType::ChangeInPercentage => {
                let count = (self.adjustment.number * current) / 100;
                if count < self.adjustment.min_step {
                    self.adjustment.min_step
                } else {
                    count
                }
            }
        }
    }

    /// The whole BEFORE check, producing the decision to record.
    async fn check(
        &self,
        cluster_id: ClusterId,
        action: &Action,
        ctx: &PolicyContext,
    ) -> PolicyDecision {
        // cooldown check
        let binding = match ctx.store.get_binding(cluster_id, self.id).await {
            Ok(binding) => binding,
            Err(e) => return PolicyDecision::reject(format!("policy check failed: {e}")),
        };
        if let Some(binding) = &binding {
            let cooldown = binding.effective_cooldown(self.adjustment.cooldown);
            if cooldown > 0
                && let Some(last_op) = binding.last_op
                && Utc::now() - last_op < Duration::seconds(cooldown)
            {
                return PolicyDecision::reject(format!(
                    "policy {} cooldown is still in progress",
                    self.id
                ));
            }
        }

        let cluster = match ctx.store.get_cluster(cluster_id).await {
            Ok(Some(cluster)) => cluster,
            Ok(None) => {
                return PolicyDecision::reject(format!("cluster {cluster_id} not found"));
            }
            Err(e) => return PolicyDecision::reject(format!("policy check failed: {e}")),
        };
        let current = i64::from(cluster.size());

        // an explicit count input wins over the computed adjustment
        let count_value = action
            .count_input()
            .unwrap_or_else(|| self.calculate_adjustment_count(cluster.size()));

        // count must be a positive integer
        if count_value <= 0 {
            return PolicyDecision::reject(format!(
                "invalid count ({count_value}) for action {}",
                action.kind
            ));
        }
        let mut count = count_value;

        let min_size = i64::from(cluster.min_size);
        let max_size = i64::from(cluster.max_size.unwrap_or(ctx.max_nodes_per_cluster));
        let best_effort = self.adjustment.best_effort;

        let desired = if action.kind == ActionKind::ClusterScaleIn {
            if best_effort {
                count = count.min(current - min_size).max(0);
            }
            current - count
        } else {
            if best_effort {
                count = count.min(max_size - current).max(0);
            }
            current + count
        };

        // strict validation unless the clamp already made the request feasible
        if !best_effort {
            if desired < min_size {
                return PolicyDecision::reject(format!(
                    "node count {desired} is below the cluster minimum {min_size}"
                ));
            }
            if desired > max_size {
                return PolicyDecision::reject(format!(
                    "node count {desired} exceeds the cluster maximum {max_size}"
                ));
            }
        }

        let plan = if action.kind == ActionKind::ClusterScaleIn {
            AdjustmentPlan::Deletion {
                count: count as u32,
            }
        } else {
            AdjustmentPlan::Creation {
                count: count as u32,
            }
        };
        PolicyDecision::ok("scaling request validated").with_plan(plan)
    }
}

#[async_trait]
impl Policy for ScalingPolicy {
    fn policy_id(&self) -> PolicyId {
        self.id
    }

    fn type_name(&self) -> &str {
        SCALING_POLICY_TYPE
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn target(&self) -> &[(PolicyPhase, ActionKind)] {
        &self.target
    }

    fn need_check(&self, phase: PolicyPhase, action: &Action) -> bool {
        if !self
            .target
            .iter()
            .any(|&(p, k)| p == phase && k == action.kind)
        {
            return false;
        }
        match phase {
            // The BEFORE check computes a plan for the direction this policy
            // watches; other scale events are someone else's business.
            PolicyPhase::Before => action.kind == self.event,
            // The AFTER check re-arms the cooldown for both directions.
            PolicyPhase::After => action.kind.is_scale(),
        }
    }

    async fn pre_op(&self, cluster_id: ClusterId, action: &mut Action, ctx: &PolicyContext) {
        let decision = self.check(cluster_id, action, ctx).await;
        action.record_decision(decision);
        if let Err(e) = ctx.store.update_action(action).await {
            warn!(policy = %self.id, action_id = %action.id,
                  "failed to persist policy decision: {e}");
        }
    }

    async fn post_op(&self, cluster_id: ClusterId, action: &Action, ctx: &PolicyContext) {
        // update last_op for the next cooldown check
        let mut binding = match ctx.store.get_binding(cluster_id, self.id).await {
            Ok(Some(binding)) => binding,
            Ok(None) => return,
            Err(e) => {
                warn!(policy = %self.id, action_id = %action.id,
                      "failed to load binding in post_op: {e}");
                return;
            }
        };
        binding.touch();
        if let Err(e) = ctx.store.update_binding(&binding).await {
            warn!(policy = %self.id, cluster_id = %cluster_id,
                  "failed to stamp cooldown timestamp: {e}");
        }
    }
}

impl std::fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scaling policy {} ({})", self.name, self.id)
    }
}
