//! Handlers for the node action family.

use async_trait::async_trait;
use corral_action::{Action, ActionKind, ActionOutcome, ActionTarget};
use corral_cluster::NodeStatus;
use corral_core::{ClusterId, ProfileId};
use corral_storage::StorageGateway;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handler::ActionHandler;

/// Executes every `NODE_*` kind.
pub struct NodeHandler;

#[async_trait]
impl ActionHandler for NodeHandler {
    async fn execute(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let ActionTarget::Node { node_id } = action.target else {
            return Err(EngineError::InvalidInput(
                "node action requires a node target".into(),
            ));
        };
        let mut node = ctx
            .store
            .get_node(node_id)
            .await?
            .ok_or_else(|| EngineError::target_not_found("node", node_id))?;

        match action.kind {
            ActionKind::NodeCreate => {
                node.set_status(NodeStatus::Active, "node creation");
                ctx.store.update_node(&node).await?;
            }
            ActionKind::NodeDelete => {
                let previous_owner = node.leave();
                node.set_status(NodeStatus::Deleted, "node deletion");
                ctx.store.update_node(&node).await?;
                if let Some(cluster_id) = previous_owner
                    && let Some(mut cluster) = ctx.store.get_cluster(cluster_id).await?
                    && cluster.remove_member(node_id)
                {
                    ctx.store.update_cluster(&cluster).await?;
                }
            }
            ActionKind::NodeUpdate => {
                if let Some(profile) = action
                    .inputs
                    .get("new_profile")
                    .and_then(serde_json::Value::as_str)
                {
                    node.profile_id = ProfileId::parse(profile)
                        .map_err(|e| EngineError::InvalidInput(format!("new_profile: {e}")))?;
                }
                node.set_status(NodeStatus::Active, "node update");
                ctx.store.update_node(&node).await?;
            }
            ActionKind::NodeJoinCluster => {
                let cluster_id = action
                    .inputs
                    .get("cluster_id")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|s| ClusterId::parse(s).ok())
                    .ok_or_else(|| {
                        EngineError::InvalidInput("'cluster_id' input is required".into())
                    })?;
                if !node.is_orphan() {
                    action.status_reason =
                        format!("node {node_id} already belongs to a cluster");
                    return Ok(ActionOutcome::Error);
                }
                if !node.status.is_active() {
                    action.status_reason = format!("node {node_id} is not active");
                    return Ok(ActionOutcome::Error);
                }
                let mut cluster = ctx
                    .store
                    .get_cluster(cluster_id)
                    .await?
                    .ok_or_else(|| EngineError::target_not_found("cluster", cluster_id))?;
                node.join(cluster_id);
                ctx.store.update_node(&node).await?;
                cluster.add_member(node_id);
                ctx.store.update_cluster(&cluster).await?;
            }
            ActionKind::NodeLeaveCluster => {
                let Some(cluster_id) = node.leave() else {
                    action.status_reason =
                        format!("node {node_id} is not a member of any cluster");
                    return Ok(ActionOutcome::Error);
                };
                ctx.store.update_node(&node).await?;
                if let Some(mut cluster) = ctx.store.get_cluster(cluster_id).await?
                    && cluster.remove_member(node_id)
                {
                    ctx.store.update_cluster(&cluster).await?;
                }
            }
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "{other} is not a node action"
                )));
            }
        }
        Ok(ActionOutcome::Ok)
    }
}
