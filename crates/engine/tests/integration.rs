//! End-to-end tests driving a real dispatcher over the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use corral_action::{
    Action, ActionKind, ActionOutcome, ActionStatus, ActionTarget, AdjustmentPlan, Cause,
    DecisionOutcome,
};
use corral_cluster::{Cluster, ClusterStatus, Node, NodeStatus, PolicyBinding};
use corral_core::{ActionId, ClusterId, NodeId, ProfileId};
use corral_engine::{
    ActionHandler, Dispatcher, EngineConfig, EngineError, EngineService, ExecutionContext,
    HandlerRegistry,
};
use corral_policy::{PolicyRegistry, ScalingPolicy, SCALING_POLICY_TYPE};
use corral_storage::{MemoryStore, PolicyRecord, StorageGateway};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("corral_engine=debug,corral_policy=debug")
        .with_test_writer()
        .try_init();
}

fn test_config() -> EngineConfig {
    EngineConfig {
        workers: 4,
        poll_interval_ms: 20,
        ..EngineConfig::default()
    }
}

fn start_engine(
    store: Arc<MemoryStore>,
    handlers: HandlerRegistry,
) -> (Arc<Dispatcher>, EngineService) {
    let dispatcher = Dispatcher::new(
        store,
        test_config(),
        Arc::new(handlers),
        Arc::new(PolicyRegistry::builtin()),
    )
    .unwrap();
    dispatcher.start();
    let service = EngineService::new(dispatcher.clone());
    (dispatcher, service)
}

async fn wait_terminal(store: &MemoryStore, id: ActionId) -> Action {
    for _ in 0..250 {
        let action = store.get_action(id).await.unwrap().unwrap();
        if action.status.is_terminal() {
            return action;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("action {id} did not reach a terminal state in time");
}

async fn seed_cluster(store: &MemoryStore, size: u32, min: u32, max: Option<u32>) -> Cluster {
    let mut cluster = Cluster::new("web", ProfileId::v4(), size).with_limits(min, max);
    for m in 0..size {
        let mut node = Node::new(format!("node-{m:03}"), cluster.profile_id, Some(cluster.id));
        node.set_status(NodeStatus::Active, "seeded");
        let id = store.create_node(node).await.unwrap();
        cluster.add_member(id);
    }
    cluster.set_status(ClusterStatus::Active, "seeded");
    store.create_cluster(cluster.clone()).await.unwrap();
    cluster
}

async fn attach_scaling_policy(store: &MemoryStore, cluster: &Cluster) -> corral_core::PolicyId {
    let record = PolicyRecord::new(
        "scale-out-by-2",
        SCALING_POLICY_TYPE,
        serde_json::json!({
            "event": "CLUSTER_SCALE_OUT",
            "adjustment": {
                "type": "change_in_capacity",
                "number": 2,
                "cooldown": 60,
                "best_effort": false
            }
        }),
    );
    let policy_id = store.create_policy(record).await.unwrap();
    store
        .attach_policy(
            PolicyBinding::new(cluster.id, policy_id).with_priority(ScalingPolicy::PRIORITY),
        )
        .await
        .unwrap();
    policy_id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scale_out_end_to_end_with_cooldown() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let cluster = seed_cluster(&store, 4, 2, Some(8)).await;
    let policy_id = attach_scaling_policy(&store, &cluster).await;

    let (dispatcher, service) = start_engine(store.clone(), HandlerRegistry::builtin());

    let action_id = service
        .create_action(
            ActionKind::ClusterScaleOut,
            Some(ActionTarget::cluster(cluster.id)),
            serde_json::Map::new(),
            Cause::Rpc,
        )
        .await
        .unwrap();

    let action = wait_terminal(&store, action_id).await;
    assert_eq!(action.status, ActionStatus::Succeeded);

    // the BEFORE hook computed and recorded the plan
    let decision = action.decision.as_ref().unwrap();
    assert_eq!(decision.outcome, DecisionOutcome::Ok);
    assert_eq!(decision.plan, Some(AdjustmentPlan::Creation { count: 2 }));

    // two NODE_CREATE children spawned, linked back to the parent
    let children: Vec<ActionId> = action
        .outputs
        .get("children")
        .and_then(|v| v.as_array())
        .unwrap()
        .iter()
        .map(|v| ActionId::parse(v.as_str().unwrap()).unwrap())
        .collect();
    assert_eq!(children.len(), 2);
    for child_id in &children {
        let child = wait_terminal(&store, *child_id).await;
        assert_eq!(child.kind, ActionKind::NodeCreate);
        assert_eq!(child.status, ActionStatus::Succeeded);
        assert_eq!(child.cause.parent(), Some(action_id));
        assert!(child.depends_on.is_empty());
        assert_eq!(child.depended_by, vec![action_id]);
    }

    // cluster grew to 6 members
    let stored = store.get_cluster(cluster.id).await.unwrap().unwrap();
    assert_eq!(stored.size(), 6);
    assert_eq!(stored.desired_size, 6);

    // the AFTER hook stamped the cooldown timestamp
    let binding = store
        .get_binding(cluster.id, policy_id)
        .await
        .unwrap()
        .unwrap();
    assert!(binding.last_op.is_some());

    // a second scale-out inside the cooldown window is rejected
    let second_id = service
        .create_action(
            ActionKind::ClusterScaleOut,
            Some(ActionTarget::cluster(cluster.id)),
            serde_json::Map::new(),
            Cause::Rpc,
        )
        .await
        .unwrap();
    let second = wait_terminal(&store, second_id).await;
    assert_eq!(second.status, ActionStatus::Failed);
    assert!(second.status_reason.contains("cooldown"));

    // the rejected round never mutated the cluster
    let stored = store.get_cluster(cluster.id).await.unwrap().unwrap();
    assert_eq!(stored.size(), 6);

    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependents_run_only_after_dependencies_succeed() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, service) = start_engine(store.clone(), HandlerRegistry::builtin());

    let first = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap();
    let second = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_depends_on(vec![first.id]);

    let ids = service.submit_batch(vec![first, second]).await.unwrap();
    let first = wait_terminal(&store, ids[0]).await;
    let second = wait_terminal(&store, ids[1]).await;

    assert_eq!(first.status, ActionStatus::Succeeded);
    assert_eq!(second.status, ActionStatus::Succeeded);
    // the dependent never entered Running before the dependency finished
    assert!(second.started_at.unwrap() >= first.completed_at.unwrap());

    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_dependency_fails_dependents_transitively() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, service) = start_engine(store.clone(), HandlerRegistry::builtin());

    // NODE_CREATE against a node record that does not exist fails
    let doomed = Action::new(
        ActionKind::NodeCreate,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap();
    let dependent = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_depends_on(vec![doomed.id]);
    let transitive = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_depends_on(vec![dependent.id]);

    let ids = service
        .submit_batch(vec![doomed, dependent, transitive])
        .await
        .unwrap();

    let doomed = wait_terminal(&store, ids[0]).await;
    assert_eq!(doomed.status, ActionStatus::Failed);

    let dependent = wait_terminal(&store, ids[1]).await;
    assert_eq!(dependent.status, ActionStatus::Failed);
    assert!(dependent.status_reason.contains("dependency"));

    let transitive = wait_terminal(&store, ids[2]).await;
    assert_eq!(transitive.status, ActionStatus::Failed);

    dispatcher.shutdown().await;
}

/// Observes per-target execution overlap through the handler.
struct OverlapProbe {
    active: Mutex<HashMap<String, u32>>,
    max_overlap: AtomicU32,
}

impl OverlapProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(HashMap::new()),
            max_overlap: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ActionHandler for OverlapProbe {
    async fn execute(
        &self,
        action: &mut Action,
        _ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let key = action.target.lock_key();
        {
            let mut active = self.active.lock();
            let count = active.entry(key.clone()).or_insert(0);
            *count += 1;
            self.max_overlap.fetch_max(*count, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
        {
            let mut active = self.active.lock();
            if let Some(count) = active.get_mut(&key) {
                *count -= 1;
            }
        }
        Ok(ActionOutcome::Ok)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_target_actions_never_overlap() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let probe = OverlapProbe::new();
    let mut handlers = HandlerRegistry::builtin();
    handlers.register(ActionKind::ActionExecute, probe.clone());
    let (dispatcher, service) = start_engine(store.clone(), handlers);

    let contended = ClusterId::v4();
    let mut ids = Vec::new();
    for _ in 0..4 {
        let action = Action::new(
            ActionKind::ActionExecute,
            Some(ActionTarget::cluster(contended)),
            Cause::Rpc,
        )
        .unwrap();
        ids.push(service.submit(action).await.unwrap());
    }
    // unrelated targets keep the pool busy concurrently
    for _ in 0..3 {
        let action = Action::new(
            ActionKind::ActionExecute,
            Some(ActionTarget::node(NodeId::v4())),
            Cause::Rpc,
        )
        .unwrap();
        ids.push(service.submit(action).await.unwrap());
    }

    for id in ids {
        let action = wait_terminal(&store, id).await;
        assert_eq!(action.status, ActionStatus::Succeeded);
    }
    assert_eq!(probe.max_overlap.load(Ordering::SeqCst), 1);

    dispatcher.shutdown().await;
}

/// Fails with a retryable outcome a fixed number of times, then succeeds.
struct FlakyHandler {
    remaining_failures: AtomicU32,
}

#[async_trait]
impl ActionHandler for FlakyHandler {
    async fn execute(
        &self,
        _action: &mut Action,
        _ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let left = self.remaining_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining_failures.store(left - 1, Ordering::SeqCst);
            return Ok(ActionOutcome::Retry);
        }
        Ok(ActionOutcome::Ok)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retryable_failures_requeue_within_budget() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mut handlers = HandlerRegistry::builtin();
    handlers.register(
        ActionKind::ActionExecute,
        Arc::new(FlakyHandler {
            remaining_failures: AtomicU32::new(2),
        }),
    );
    let (dispatcher, service) = start_engine(store.clone(), handlers);

    let action = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap();
    let id = service.submit(action).await.unwrap();

    let action = wait_terminal(&store, id).await;
    assert_eq!(action.status, ActionStatus::Succeeded);
    assert_eq!(action.retries, 2);

    dispatcher.shutdown().await;
}

/// Never stops asking for a retry.
struct AlwaysRetryHandler;

#[async_trait]
impl ActionHandler for AlwaysRetryHandler {
    async fn execute(
        &self,
        _action: &mut Action,
        _ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        Ok(ActionOutcome::Retry)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retry_budget_exhaustion_fails_the_action() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mut handlers = HandlerRegistry::builtin();
    handlers.register(ActionKind::ActionExecute, Arc::new(AlwaysRetryHandler));
    let (dispatcher, service) = start_engine(store.clone(), handlers);

    let action = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap();
    let id = service.submit(action).await.unwrap();

    let action = wait_terminal(&store, id).await;
    assert_eq!(action.status, ActionStatus::Failed);
    assert!(action.status_reason.contains("retry limit"));
    assert_eq!(action.retries, test_config().max_retries);

    dispatcher.shutdown().await;
}

/// Sleeps long enough for the timeout sweep to catch it.
struct StuckHandler;

#[async_trait]
impl ActionHandler for StuckHandler {
    async fn execute(
        &self,
        _action: &mut Action,
        _ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Ok(ActionOutcome::Ok)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_sweep_fails_stuck_actions_and_unblocks_dependents() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mut handlers = HandlerRegistry::builtin();
    handlers.register(ActionKind::ActionExecute, Arc::new(StuckHandler));
    let (dispatcher, service) = start_engine(store.clone(), handlers);

    let stuck = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_timeout(0);
    let dependent = Action::new(
        ActionKind::NodeLeaveCluster,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_depends_on(vec![stuck.id]);

    let ids = service.submit_batch(vec![stuck, dependent]).await.unwrap();

    let stuck = wait_terminal(&store, ids[0]).await;
    assert_eq!(stuck.status, ActionStatus::Failed);
    assert!(stuck.status_reason.contains("timed out"));
    assert!(stuck.owner.is_none());

    // the dependent is unblocked (by failure propagation)
    let dependent = wait_terminal(&store, ids[1]).await;
    assert_eq!(dependent.status, ActionStatus::Failed);
    assert!(dependent.status_reason.contains("dependency"));

    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelling_a_waiting_dependent_sticks() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let mut handlers = HandlerRegistry::builtin();
    handlers.register(ActionKind::ActionExecute, Arc::new(StuckHandler));
    let (dispatcher, service) = start_engine(store.clone(), handlers);

    let slow = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap();
    let dependent = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_depends_on(vec![slow.id]);

    let ids = service.submit_batch(vec![slow, dependent]).await.unwrap();

    // cancel the dependent while its dependency is still running
    tokio::time::sleep(Duration::from_millis(50)).await;
    service.cancel_action(ids[1]).await.unwrap();

    let dependent = wait_terminal(&store, ids[1]).await;
    assert_eq!(dependent.status, ActionStatus::Cancelled);

    // the dependency still completes on its own
    let slow = wait_terminal(&store, ids[0]).await;
    assert_eq!(slow.status, ActionStatus::Succeeded);

    // cancellation is terminal: completion of the dependency does not
    // resurrect the dependent
    let still = store.get_action(ids[1]).await.unwrap().unwrap();
    assert_eq!(still.status, ActionStatus::Cancelled);

    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeating_action_rearms_as_a_fresh_record() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, service) = start_engine(store.clone(), HandlerRegistry::builtin());

    let action = Action::new(
        ActionKind::ActionExecute,
        Some(ActionTarget::node(NodeId::v4())),
        Cause::Rpc,
    )
    .unwrap()
    .with_interval(3600);
    let id = service.submit(action).await.unwrap();

    let action = wait_terminal(&store, id).await;
    assert_eq!(action.status, ActionStatus::Succeeded);

    // the follow-up exists, is ready, but is deferred past its interval
    tokio::time::sleep(Duration::from_millis(100)).await;
    let ready = store.list_ready_actions().await.unwrap();
    assert_eq!(ready.len(), 1);
    let followup = &ready[0];
    assert_eq!(followup.kind, ActionKind::ActionExecute);
    assert_eq!(followup.cause.parent(), Some(id));
    assert_eq!(followup.interval, 3600);
    assert!(!followup.is_claimable(chrono::Utc::now()));

    dispatcher.shutdown().await;
}
