//! The policy hook trait and its evaluation context.

use std::sync::Arc;

use async_trait::async_trait;
use corral_action::{Action, ActionKind};
use corral_core::ClusterId;
use corral_storage::StorageGateway;
use serde::{Deserialize, Serialize};

/// Which side of execution a hook observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPhase {
    /// Before the handler runs; may veto execution.
    Before,
    /// After the handler completed; side effects only.
    After,
}

impl std::fmt::Display for PolicyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Shared state handed to every hook invocation.
#[derive(Clone)]
pub struct PolicyContext {
    /// The durable record store.
    pub store: Arc<dyn StorageGateway>,
    /// Engine-wide upper bound applied when a cluster has no `max_size`.
    pub max_nodes_per_cluster: u32,
}

impl PolicyContext {
    /// Create a context.
    #[must_use]
    pub fn new(store: Arc<dyn StorageGateway>, max_nodes_per_cluster: u32) -> Self {
        Self {
            store,
            max_nodes_per_cluster,
        }
    }
}

/// A governance hook that intercepts matching actions around execution.
///
/// Implementations record their BEFORE verdict on the action itself (see
/// [`Action::record_decision`]) and persist it — the dispatcher reads the
/// decision, not a return value. Neither hook may propagate errors:
/// internal failures become rejecting decisions (`pre_op`) or warnings
/// (`post_op`), because hook faults must not crash the dispatcher.
#[async_trait]
pub trait Policy: Send + Sync {
    /// The stored policy record this instance was built from.
    fn policy_id(&self) -> corral_core::PolicyId;

    /// The registered type name (e.g. `"corral.policy.scaling"`).
    fn type_name(&self) -> &str;

    /// Default evaluation priority for new bindings; lower runs earlier.
    fn priority(&self) -> i32;

    /// The (phase, kind) pairs this policy wants to observe.
    fn target(&self) -> &[(PolicyPhase, ActionKind)];

    /// Returns `true` if this policy's hook should run for the given phase
    /// and action. The default matches against [`Policy::target`];
    /// implementations narrow it further (a scaling policy only runs its
    /// BEFORE hook for the event it watches).
    fn need_check(&self, phase: PolicyPhase, action: &Action) -> bool {
        self.target()
            .iter()
            .any(|&(p, k)| p == phase && k == action.kind)
    }

    /// BEFORE hook: validate or veto the action, recording the verdict on
    /// the action record.
    async fn pre_op(&self, cluster_id: ClusterId, action: &mut Action, ctx: &PolicyContext);

    /// AFTER hook: side effects once execution completed (e.g. re-arming a
    /// cooldown window).
    async fn post_op(&self, cluster_id: ClusterId, action: &Action, ctx: &PolicyContext);
}

impl core::fmt::Debug for dyn Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Policy")
            .field("type_name", &self.type_name())
            .field("policy_id", &self.policy_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_action::{ActionTarget, Cause, PolicyDecision};
    use corral_core::PolicyId;

    struct FixedPolicy {
        id: PolicyId,
        target: Vec<(PolicyPhase, ActionKind)>,
    }

    #[async_trait]
    impl Policy for FixedPolicy {
        fn policy_id(&self) -> PolicyId {
            self.id
        }
        fn type_name(&self) -> &str {
            "test.fixed"
        }
        fn priority(&self) -> i32 {
            50
        }
        fn target(&self) -> &[(PolicyPhase, ActionKind)] {
            &self.target
        }
        async fn pre_op(&self, _cluster_id: ClusterId, action: &mut Action, _ctx: &PolicyContext) {
            action.record_decision(PolicyDecision::ok("fixed"));
        }
        async fn post_op(&self, _cluster_id: ClusterId, _action: &Action, _ctx: &PolicyContext) {}
    }

    #[test]
    fn default_need_check_matches_target_pairs() {
        let policy = FixedPolicy {
            id: PolicyId::v4(),
            target: vec![
                (PolicyPhase::Before, ActionKind::ClusterScaleOut),
                (PolicyPhase::After, ActionKind::ClusterScaleIn),
            ],
        };
        let scale_out = Action::new(
            ActionKind::ClusterScaleOut,
            Some(ActionTarget::cluster(corral_core::ClusterId::v4())),
            Cause::Rpc,
        )
        .unwrap();

        assert!(policy.need_check(PolicyPhase::Before, &scale_out));
        assert!(!policy.need_check(PolicyPhase::After, &scale_out));

        let create = Action::new(
            ActionKind::ClusterCreate,
            Some(ActionTarget::cluster(corral_core::ClusterId::v4())),
            Cause::Rpc,
        )
        .unwrap();
        assert!(!policy.need_check(PolicyPhase::Before, &create));
    }

    #[test]
    fn phase_display() {
        assert_eq!(PolicyPhase::Before.to_string(), "before");
        assert_eq!(PolicyPhase::After.to_string(), "after");
    }
}
