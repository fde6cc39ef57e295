//! In-memory reference backend.

use std::collections::HashMap;

use async_trait::async_trait;
use corral_action::{Action, ActionStatus};
use corral_cluster::{Cluster, Node, PolicyBinding};
use corral_core::{ActionId, ClusterId, NodeId, PolicyId, WorkerId};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::gateway::StorageGateway;
use crate::record::PolicyRecord;
use crate::Result;

#[derive(Default)]
struct Tables {
    actions: HashMap<ActionId, Action>,
    clusters: HashMap<ClusterId, Cluster>,
    nodes: HashMap<NodeId, Node>,
    policies: HashMap<PolicyId, PolicyRecord>,
    // Vec keeps attachment order, which breaks priority ties.
    bindings: Vec<PolicyBinding>,
    target_locks: HashMap<String, ActionId>,
}

/// Mutex-guarded tables with real compare-and-set claim semantics.
///
/// Every mutation takes the write lock for its full critical section, so
/// the CAS path observes the same atomicity a transactional backend would
/// provide.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_terminal(
        &self,
        id: ActionId,
        status: ActionStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let action = tables
            .actions
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("action", id))?;
        match reason {
            Some(reason) => action.set_status_with_reason(status, reason),
            None => action.set_status(status),
        }
        .map_err(|e| StorageError::Conflict(e.to_string()))
    }
}

#[async_trait]
impl StorageGateway for MemoryStore {
    async fn create_action(&self, action: Action) -> Result<ActionId> {
        let id = action.id;
        self.tables.write().actions.insert(id, action);
        Ok(id)
    }

    async fn get_action(&self, id: ActionId) -> Result<Option<Action>> {
        Ok(self.tables.read().actions.get(&id).cloned())
    }

    async fn update_action(&self, action: &Action) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.actions.get_mut(&action.id) {
            Some(stored) => {
                *stored = action.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("action", action.id)),
        }
    }

    async fn compare_and_set_owner(
        &self,
        id: ActionId,
        expected: Option<WorkerId>,
        new: Option<WorkerId>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let action = tables
            .actions
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("action", id))?;
        if action.owner == expected {
            action.owner = new;
            Ok(true)
        } else {
            debug!(action_id = %id, "ownership claim lost to another worker");
            Ok(false)
        }
    }

    async fn mark_succeeded(&self, id: ActionId) -> Result<()> {
        self.mark_terminal(id, ActionStatus::Succeeded, None)
    }

    async fn mark_failed(&self, id: ActionId, reason: &str) -> Result<()> {
        self.mark_terminal(id, ActionStatus::Failed, Some(reason))
    }

    async fn mark_cancelled(&self, id: ActionId, reason: &str) -> Result<()> {
        self.mark_terminal(id, ActionStatus::Cancelled, Some(reason))
    }

    async fn list_ready_actions(&self) -> Result<Vec<Action>> {
        Ok(self
            .tables
            .read()
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::Ready)
            .cloned()
            .collect())
    }

    async fn list_running_actions(&self) -> Result<Vec<Action>> {
        Ok(self
            .tables
            .read()
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::Running)
            .cloned()
            .collect())
    }

    async fn try_lock_target(&self, key: &str, holder: ActionId) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.target_locks.get(key) {
            Some(&current) if current != holder => {
                debug!(target_key = key, holder = %current, "target lock contended");
                Ok(false)
            }
            _ => {
                tables.target_locks.insert(key.to_owned(), holder);
                Ok(true)
            }
        }
    }

    async fn unlock_target(&self, key: &str, holder: ActionId) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.target_locks.get(key) {
            Some(&current) if current == holder => {
                tables.target_locks.remove(key);
            }
            Some(&current) => {
                warn!(target_key = key, holder = %current, requester = %holder,
                      "refusing to release a lock held by another action");
            }
            None => {}
        }
        Ok(())
    }

    async fn create_cluster(&self, cluster: Cluster) -> Result<ClusterId> {
        let id = cluster.id;
        self.tables.write().clusters.insert(id, cluster);
        Ok(id)
    }

    async fn get_cluster(&self, id: ClusterId) -> Result<Option<Cluster>> {
        Ok(self.tables.read().clusters.get(&id).cloned())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.clusters.get_mut(&cluster.id) {
            Some(stored) => {
                *stored = cluster.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("cluster", cluster.id)),
        }
    }

    async fn create_node(&self, node: Node) -> Result<NodeId> {
        let id = node.id;
        self.tables.write().nodes.insert(id, node);
        Ok(id)
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.tables.read().nodes.get(&id).cloned())
    }

    async fn update_node(&self, node: &Node) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.nodes.get_mut(&node.id) {
            Some(stored) => {
                *stored = node.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("node", node.id)),
        }
    }

    async fn get_members(&self, cluster_id: ClusterId) -> Result<Vec<Node>> {
        let tables = self.tables.read();
        let cluster = tables
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| StorageError::not_found("cluster", cluster_id))?;
        Ok(cluster
            .nodes
            .iter()
            .filter_map(|id| tables.nodes.get(id))
            .cloned()
            .collect())
    }

    async fn create_policy(&self, record: PolicyRecord) -> Result<PolicyId> {
        let id = record.id;
        self.tables.write().policies.insert(id, record);
        Ok(id)
    }

    async fn get_policy(&self, id: PolicyId) -> Result<Option<PolicyRecord>> {
        Ok(self.tables.read().policies.get(&id).cloned())
    }

    async fn attach_policy(&self, binding: PolicyBinding) -> Result<()> {
        let mut tables = self.tables.write();
        let exists = tables
            .bindings
            .iter()
            .any(|b| b.cluster_id == binding.cluster_id && b.policy_id == binding.policy_id);
        if exists {
            return Err(StorageError::Conflict(format!(
                "policy {} already attached to cluster {}",
                binding.policy_id, binding.cluster_id
            )));
        }
        tables.bindings.push(binding);
        Ok(())
    }

    async fn detach_policy(&self, cluster_id: ClusterId, policy_id: PolicyId) -> Result<()> {
        self.tables
            .write()
            .bindings
            .retain(|b| !(b.cluster_id == cluster_id && b.policy_id == policy_id));
        Ok(())
    }

    async fn get_binding(
        &self,
        cluster_id: ClusterId,
        policy_id: PolicyId,
    ) -> Result<Option<PolicyBinding>> {
        Ok(self
            .tables
            .read()
            .bindings
            .iter()
            .find(|b| b.cluster_id == cluster_id && b.policy_id == policy_id)
            .cloned())
    }

    async fn list_bindings(&self, cluster_id: ClusterId) -> Result<Vec<PolicyBinding>> {
        Ok(self
            .tables
            .read()
            .bindings
            .iter()
            .filter(|b| b.cluster_id == cluster_id)
            .cloned()
            .collect())
    }

    async fn update_binding(&self, binding: &PolicyBinding) -> Result<()> {
        let mut tables = self.tables.write();
        match tables
            .bindings
            .iter_mut()
            .find(|b| b.cluster_id == binding.cluster_id && b.policy_id == binding.policy_id)
        {
            Some(stored) => {
                *stored = binding.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("binding", binding.policy_id)),
        }
    }
}
