//! The storage contract the engine core consumes.

use async_trait::async_trait;
use corral_action::Action;
use corral_cluster::{Cluster, Node, PolicyBinding};
use corral_core::{ActionId, ClusterId, NodeId, PolicyId, WorkerId};

use crate::Result;
use crate::record::PolicyRecord;

/// Durable record store for actions, clusters, nodes, policies, and
/// policy bindings.
///
/// This is an abstract contract, not a wire format. The engine treats the
/// gateway as the single source of truth: ownership claims and target locks
/// are persisted here so they survive worker restarts.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    // --- actions ---

    /// Persist a new action record. Returns the persisted identifier.
    async fn create_action(&self, action: Action) -> Result<ActionId>;

    /// Fetch an action by id, or `None` if absent.
    async fn get_action(&self, id: ActionId) -> Result<Option<Action>>;

    /// Overwrite an existing action record.
    async fn update_action(&self, action: &Action) -> Result<()>;

    /// Atomically swing the ownership claim from `expected` to `new`.
    ///
    /// Returns `false` when the stored owner did not match `expected` — a
    /// lost race, to be skipped silently by the caller.
    async fn compare_and_set_owner(
        &self,
        id: ActionId,
        expected: Option<WorkerId>,
        new: Option<WorkerId>,
    ) -> Result<bool>;

    /// Durably mark an action succeeded, releasing ownership.
    async fn mark_succeeded(&self, id: ActionId) -> Result<()>;

    /// Durably mark an action failed with a reason, releasing ownership.
    async fn mark_failed(&self, id: ActionId, reason: &str) -> Result<()>;

    /// Durably mark an action cancelled with a reason, releasing ownership.
    async fn mark_cancelled(&self, id: ActionId, reason: &str) -> Result<()>;

    /// All actions currently in the `Ready` state.
    async fn list_ready_actions(&self) -> Result<Vec<Action>>;

    /// All actions currently in the `Running` state.
    async fn list_running_actions(&self) -> Result<Vec<Action>>;

    // --- target locks ---

    /// Try to acquire the mutual-exclusion lock for a target key on behalf
    /// of an action. Returns `false` if another action holds it. Re-locking
    /// by the current holder succeeds.
    async fn try_lock_target(&self, key: &str, holder: ActionId) -> Result<bool>;

    /// Release a target lock held by `holder`. Releasing a lock held by a
    /// different action is a no-op.
    async fn unlock_target(&self, key: &str, holder: ActionId) -> Result<()>;

    // --- clusters ---

    /// Persist a new cluster record. Returns the persisted identifier.
    async fn create_cluster(&self, cluster: Cluster) -> Result<ClusterId>;

    /// Fetch a cluster by id, or `None` if absent.
    async fn get_cluster(&self, id: ClusterId) -> Result<Option<Cluster>>;

    /// Overwrite an existing cluster record.
    async fn update_cluster(&self, cluster: &Cluster) -> Result<()>;

    // --- nodes ---

    /// Persist a new node record. Returns the persisted identifier.
    async fn create_node(&self, node: Node) -> Result<NodeId>;

    /// Fetch a node by id, or `None` if absent.
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Overwrite an existing node record.
    async fn update_node(&self, node: &Node) -> Result<()>;

    /// The member nodes of a cluster, in membership order.
    async fn get_members(&self, cluster_id: ClusterId) -> Result<Vec<Node>>;

    // --- policies ---

    /// Persist a new policy record. Returns the persisted identifier.
    async fn create_policy(&self, record: PolicyRecord) -> Result<PolicyId>;

    /// Fetch a policy by id, or `None` if absent.
    async fn get_policy(&self, id: PolicyId) -> Result<Option<PolicyRecord>>;

    // --- policy bindings ---

    /// Attach a policy to a cluster. Fails with a conflict if the binding
    /// already exists.
    async fn attach_policy(&self, binding: PolicyBinding) -> Result<()>;

    /// Detach a policy from a cluster. Missing bindings are a no-op.
    async fn detach_policy(&self, cluster_id: ClusterId, policy_id: PolicyId) -> Result<()>;

    /// Fetch one binding, or `None` if absent.
    async fn get_binding(
        &self,
        cluster_id: ClusterId,
        policy_id: PolicyId,
    ) -> Result<Option<PolicyBinding>>;

    /// All bindings for a cluster, in attachment order.
    async fn list_bindings(&self, cluster_id: ClusterId) -> Result<Vec<PolicyBinding>>;

    /// Overwrite an existing binding record.
    async fn update_binding(&self, binding: &PolicyBinding) -> Result<()>;
}
