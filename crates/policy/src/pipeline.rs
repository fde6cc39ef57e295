//! The hook pipeline: resolves a cluster's attached policies and runs the
//! matching hooks around action execution.

use std::sync::Arc;

use corral_action::{Action, PolicyDecision};
use corral_cluster::PolicyBinding;
use corral_core::ClusterId;
use corral_storage::StorageGateway;
use tracing::{debug, warn};

use crate::policy::{Policy, PolicyContext, PolicyPhase};
use crate::registry::PolicyRegistry;

/// Runs a cluster's enabled policies against an action, in ascending
/// priority order with attachment order breaking ties.
///
/// A rejecting verdict from any BEFORE hook is sticky for the round: later
/// hooks are not consulted and the dispatcher must fail the action instead
/// of executing it. AFTER hooks are side-effect only and all of them run.
pub struct PolicyPipeline {
    registry: Arc<PolicyRegistry>,
}

impl PolicyPipeline {
    /// Create a pipeline over a policy registry.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }

    /// The cluster's enabled policies, instantiated and ordered for one
    /// hook round. Unresolvable entries (missing record, unknown type,
    /// invalid spec) are skipped with a warning — a broken attachment must
    /// not wedge every action against the cluster.
    async fn resolve(
        &self,
        cluster_id: ClusterId,
        ctx: &PolicyContext,
    ) -> Vec<(PolicyBinding, Arc<dyn Policy>)> {
        let bindings = match ctx.store.list_bindings(cluster_id).await {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!(cluster_id = %cluster_id, "failed to list policy bindings: {e}");
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(bindings.len());
        for binding in bindings.into_iter().filter(|b| b.enabled) {
            let record = match ctx.store.get_policy(binding.policy_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(policy_id = %binding.policy_id, "binding references a missing policy");
                    continue;
                }
                Err(e) => {
                    warn!(policy_id = %binding.policy_id, "failed to load policy record: {e}");
                    continue;
                }
            };
            match self.registry.build(&record) {
                Ok(policy) => entries.push((binding, policy)),
                Err(e) => {
                    warn!(policy_id = %record.id, type_name = %record.type_name,
                          "failed to instantiate policy: {e}");
                }
            }
        }

        // stable sort: attachment order breaks priority ties
        entries.sort_by_key(|(binding, _)| binding.priority);
        entries
    }

    /// Run the BEFORE hooks for an action. Returns the sticky rejection if
    /// any hook vetoed execution.
    pub async fn run_before(
        &self,
        action: &mut Action,
        ctx: &PolicyContext,
    ) -> Option<PolicyDecision> {
        let cluster_id = action.target.cluster_id()?;
        for (_, policy) in self.resolve(cluster_id, ctx).await {
            if !policy.need_check(PolicyPhase::Before, action) {
                continue;
            }
            debug!(action_id = %action.id, policy = %policy.policy_id(), "running BEFORE hook");
            policy.pre_op(cluster_id, action, ctx).await;
            if let Some(decision) = &action.decision
                && decision.is_rejection()
            {
                return Some(decision.clone());
            }
        }
        None
    }

    /// Run the AFTER hooks for an action. Hook failures are logged by the
    /// policies themselves and never fail the already-completed action.
    pub async fn run_after(&self, action: &Action, ctx: &PolicyContext) {
        let Some(cluster_id) = action.target.cluster_id() else {
            return;
        };
        for (_, policy) in self.resolve(cluster_id, ctx).await {
            if policy.need_check(PolicyPhase::After, action) {
                debug!(action_id = %action.id, policy = %policy.policy_id(), "running AFTER hook");
                policy.post_op(cluster_id, action, ctx).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corral_action::{ActionKind, ActionTarget, Cause};
    use corral_cluster::Cluster;
    use corral_core::{PolicyId, ProfileId};
    use corral_storage::{MemoryStore, PolicyRecord, StorageGateway};
    use pretty_assertions::assert_eq;

    // A test policy that stamps its record name into the decision reason,
    // so hook ordering is observable.
    struct StampPolicy {
        id: PolicyId,
        name: String,
        target: Vec<(PolicyPhase, ActionKind)>,
    }

    #[async_trait]
    impl Policy for StampPolicy {
        fn policy_id(&self) -> PolicyId {
            self.id
        }
        fn type_name(&self) -> &str {
            "test.stamp"
        }
        fn priority(&self) -> i32 {
            0
        }
        fn target(&self) -> &[(PolicyPhase, ActionKind)] {
            &self.target
        }
        async fn pre_op(&self, _cluster_id: ClusterId, action: &mut Action, _ctx: &PolicyContext) {
            action.record_decision(PolicyDecision::ok(self.name.clone()));
        }
        async fn post_op(&self, _cluster_id: ClusterId, _action: &Action, _ctx: &PolicyContext) {}
    }

    fn stamp_ctor(record: &PolicyRecord) -> Result<Arc<dyn Policy>, crate::PolicyError> {
        Ok(Arc::new(StampPolicy {
            id: record.id,
            name: record.name.clone(),
            target: vec![(PolicyPhase::Before, ActionKind::ClusterScaleOut)],
        }))
    }

    // A test policy that always vetoes.
    struct VetoPolicy {
        id: PolicyId,
        target: Vec<(PolicyPhase, ActionKind)>,
    }

    #[async_trait]
    impl Policy for VetoPolicy {
        fn policy_id(&self) -> PolicyId {
            self.id
        }
        fn type_name(&self) -> &str {
            "test.veto"
        }
        fn priority(&self) -> i32 {
            0
        }
        fn target(&self) -> &[(PolicyPhase, ActionKind)] {
            &self.target
        }
        async fn pre_op(&self, _cluster_id: ClusterId, action: &mut Action, _ctx: &PolicyContext) {
            action.record_decision(PolicyDecision::reject("vetoed"));
        }
        async fn post_op(&self, _cluster_id: ClusterId, _action: &Action, _ctx: &PolicyContext) {}
    }

    fn veto_ctor(record: &PolicyRecord) -> Result<Arc<dyn Policy>, crate::PolicyError> {
        Ok(Arc::new(VetoPolicy {
            id: record.id,
            target: vec![(PolicyPhase::Before, ActionKind::ClusterScaleOut)],
        }))
    }

    fn test_registry() -> Arc<PolicyRegistry> {
        let mut registry = PolicyRegistry::new();
        registry.register("test.stamp", stamp_ctor);
        registry.register("test.veto", veto_ctor);
        Arc::new(registry)
    }

    async fn setup() -> (PolicyContext, Cluster) {
        let store = Arc::new(MemoryStore::new());
        let cluster = Cluster::new("web", ProfileId::v4(), 2);
        store.create_cluster(cluster.clone()).await.unwrap();
        (PolicyContext::new(store, 100), cluster)
    }

    async fn attach(
        ctx: &PolicyContext,
        cluster: &Cluster,
        name: &str,
        type_name: &str,
        priority: i32,
    ) -> PolicyId {
        let record = PolicyRecord::new(name, type_name, serde_json::json!({}));
        let id = ctx.store.create_policy(record).await.unwrap();
        ctx.store
            .attach_policy(PolicyBinding::new(cluster.id, id).with_priority(priority))
            .await
            .unwrap();
        id
    }

    fn scale_out(cluster_id: ClusterId) -> Action {
        let mut action = Action::new(
            ActionKind::ClusterScaleOut,
            Some(ActionTarget::cluster(cluster_id)),
            Cause::Rpc,
        )
        .unwrap();
        action.set_status(corral_action::ActionStatus::Ready).unwrap();
        action
    }

    #[tokio::test]
    async fn hooks_run_in_ascending_priority_order() {
        let (ctx, cluster) = setup().await;
        attach(&ctx, &cluster, "late", "test.stamp", 200).await;
        attach(&ctx, &cluster, "early", "test.stamp", 10).await;

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = scale_out(cluster.id);
        let rejection = pipeline.run_before(&mut action, &ctx).await;

        assert!(rejection.is_none());
        // the later (higher-priority-number) hook overwrote the earlier OK
        assert_eq!(action.decision.unwrap().reason, "late");
    }

    #[tokio::test]
    async fn attachment_order_breaks_priority_ties() {
        let (ctx, cluster) = setup().await;
        attach(&ctx, &cluster, "first", "test.stamp", 100).await;
        attach(&ctx, &cluster, "second", "test.stamp", 100).await;

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = scale_out(cluster.id);
        pipeline.run_before(&mut action, &ctx).await;

        assert_eq!(action.decision.unwrap().reason, "second");
    }

    #[tokio::test]
    async fn rejection_is_sticky() {
        let (ctx, cluster) = setup().await;
        attach(&ctx, &cluster, "veto", "test.veto", 10).await;
        attach(&ctx, &cluster, "stamp", "test.stamp", 200).await;

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = scale_out(cluster.id);
        let rejection = pipeline.run_before(&mut action, &ctx).await;

        // the veto short-circuits; the stamp hook never overwrites it
        assert_eq!(rejection.unwrap().reason, "vetoed");
        assert_eq!(action.decision.unwrap().reason, "vetoed");
    }

    #[tokio::test]
    async fn disabled_bindings_are_skipped() {
        let (ctx, cluster) = setup().await;
        let id = attach(&ctx, &cluster, "veto", "test.veto", 10).await;
        let mut binding = ctx.store.get_binding(cluster.id, id).await.unwrap().unwrap();
        binding.enabled = false;
        ctx.store.update_binding(&binding).await.unwrap();

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = scale_out(cluster.id);
        let rejection = pipeline.run_before(&mut action, &ctx).await;

        assert!(rejection.is_none());
        assert!(action.decision.is_none());
    }

    #[tokio::test]
    async fn unknown_policy_type_is_skipped_not_fatal() {
        let (ctx, cluster) = setup().await;
        attach(&ctx, &cluster, "ghost", "test.unregistered", 10).await;
        attach(&ctx, &cluster, "stamp", "test.stamp", 20).await;

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = scale_out(cluster.id);
        let rejection = pipeline.run_before(&mut action, &ctx).await;

        assert!(rejection.is_none());
        assert_eq!(action.decision.unwrap().reason, "stamp");
    }

    #[tokio::test]
    async fn node_targets_have_no_policy_round() {
        let (ctx, cluster) = setup().await;
        attach(&ctx, &cluster, "veto", "test.veto", 10).await;

        let pipeline = PolicyPipeline::new(test_registry());
        let mut action = Action::new(
            ActionKind::NodeCreate,
            Some(ActionTarget::node(corral_core::NodeId::v4())),
            Cause::Rpc,
        )
        .unwrap();
        let rejection = pipeline.run_before(&mut action, &ctx).await;
        assert!(rejection.is_none());
    }
}
