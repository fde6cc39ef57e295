//! Handlers for the cluster action family.

use async_trait::async_trait;
use corral_action::{
    Action, ActionKind, ActionOutcome, ActionTarget, AdjustmentPlan, Cause,
};
use corral_cluster::{Cluster, ClusterStatus, Node, PolicyBinding};
use corral_core::{NodeId, PolicyId, ProfileId};
use corral_storage::StorageGateway;
use tracing::info;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handler::ActionHandler;

/// Executes every `CLUSTER_*` kind.
pub struct ClusterHandler;

#[async_trait]
impl ActionHandler for ClusterHandler {
    async fn execute(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let ActionTarget::Cluster { cluster_id } = action.target else {
            return Err(EngineError::InvalidInput(
                "cluster action requires a cluster target".into(),
            ));
        };
        let mut cluster = ctx
            .store
            .get_cluster(cluster_id)
            .await?
            .ok_or_else(|| EngineError::target_not_found("cluster", cluster_id))?;

        if !cluster.status.is_operable() && action.kind != ActionKind::ClusterDelete {
            action.status_reason = format!("cluster {cluster_id} is {}", cluster.status);
            return Ok(ActionOutcome::Error);
        }

        match action.kind {
            ActionKind::ClusterCreate => self.do_create(action, &mut cluster, ctx).await,
            ActionKind::ClusterUpdate => self.do_update(action, &mut cluster, ctx).await,
            ActionKind::ClusterDelete => self.do_delete(action, &mut cluster, ctx).await,
            ActionKind::ClusterAddNodes => self.do_add_nodes(action, &mut cluster, ctx).await,
            ActionKind::ClusterDelNodes => self.do_del_nodes(action, &mut cluster, ctx).await,
            ActionKind::ClusterScaleOut => self.do_scale_out(action, &mut cluster, ctx).await,
            ActionKind::ClusterScaleIn => self.do_scale_in(action, &mut cluster, ctx).await,
            ActionKind::ClusterAttachPolicy => {
                self.do_attach_policy(action, &cluster, ctx).await
            }
            ActionKind::ClusterDetachPolicy => {
                self.do_detach_policy(action, &cluster, ctx).await
            }
            other => Err(EngineError::InvalidInput(format!(
                "{other} is not a cluster action"
            ))),
        }
    }
}

impl ClusterHandler {
    /// Spawn one `NODE_CREATE` child, creating the node record and adding
    /// it to the membership list immediately.
    async fn spawn_member(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        index: u32,
        ctx: &ExecutionContext,
    ) -> Result<NodeId, EngineError> {
        let node = Node::new(
            format!("node-{index:03}"),
            cluster.profile_id,
            Some(cluster.id),
        );
        let node_id = ctx.store.create_node(node).await?;
        cluster.add_member(node_id);

        let child = Action::new(
            ActionKind::NodeCreate,
            Some(ActionTarget::node(node_id)),
            Cause::Rpc,
        )?
        .with_name(format!("node_create_{index:03}"));
        ctx.spawn_child(action, child).await?;
        Ok(node_id)
    }

    async fn do_create(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        info!(cluster_id = %cluster.id, size = cluster.desired_size, "creating cluster");
        // start from the observed size so a re-run after a crash does not
        // double-provision members
        for m in cluster.size()..cluster.desired_size {
            self.spawn_member(action, cluster, m, ctx).await?;
        }
        cluster.set_status(ClusterStatus::Active, "cluster creation");
        ctx.store.update_cluster(cluster).await?;
        Ok(ActionOutcome::Ok)
    }

    async fn do_update(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        cluster.set_status(ClusterStatus::Updating, "cluster update");

        let new_profile = action
            .inputs
            .get("new_profile_id")
            .and_then(serde_json::Value::as_str)
            .map(ProfileId::parse)
            .transpose()
            .map_err(|e| EngineError::InvalidInput(format!("new_profile_id: {e}")))?;
        if let Some(profile_id) = new_profile {
            cluster.profile_id = profile_id;
        }

        for node_id in cluster.nodes.clone() {
            let mut child = Action::new(
                ActionKind::NodeUpdate,
                Some(ActionTarget::node(node_id)),
                Cause::Rpc,
            )?
            .with_name(format!("node_update_{node_id}"));
            if let Some(profile_id) = new_profile {
                child = child.with_input("new_profile", serde_json::json!(profile_id.to_string()));
            }
            ctx.spawn_child(action, child).await?;
        }

        cluster.set_status(ClusterStatus::Active, "cluster update");
        ctx.store.update_cluster(cluster).await?;
        Ok(ActionOutcome::Ok)
    }

    async fn do_delete(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        info!(cluster_id = %cluster.id, "deleting cluster");
        for node_id in cluster.nodes.clone() {
            let child = Action::new(
                ActionKind::NodeDelete,
                Some(ActionTarget::node(node_id)),
                Cause::Rpc,
            )?
            .with_name(format!("node_delete_{node_id}"));
            ctx.spawn_child(action, child).await?;
        }
        cluster.set_status(ClusterStatus::Deleted, "cluster deletion");
        ctx.store.update_cluster(cluster).await?;
        Ok(ActionOutcome::Ok)
    }

    async fn do_add_nodes(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let ids = node_ids_input(action)?;
        let mut added = 0u32;
        for node_id in ids {
            if cluster.has_member(node_id) {
                continue;
            }
            let mut node = ctx
                .store
                .get_node(node_id)
                .await?
                .ok_or_else(|| EngineError::target_not_found("node", node_id))?;
            if !node.status.is_active() {
                action.status_reason = format!("node {node_id} is not active");
                return Ok(ActionOutcome::Error);
            }
            if !node.is_orphan() {
                action.status_reason =
                    format!("node {node_id} is owned by another cluster");
                return Ok(ActionOutcome::Error);
            }
            node.join(cluster.id);
            ctx.store.update_node(&node).await?;
            cluster.add_member(node_id);
            added += 1;
        }
        if added == 0 {
            action.status_reason = "no nodes to add".into();
            return Ok(ActionOutcome::Error);
        }
        cluster.desired_size += added;
        ctx.store.update_cluster(cluster).await?;
        Ok(ActionOutcome::Ok)
    }

    async fn do_del_nodes(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let ids = node_ids_input(action)?;
        for &node_id in &ids {
            if !cluster.has_member(node_id) {
                action.status_reason =
                    format!("node {node_id} is not a member of cluster {}", cluster.id);
                return Ok(ActionOutcome::Error);
            }
        }
        for node_id in ids {
            let mut node = ctx
                .store
                .get_node(node_id)
                .await?
                .ok_or_else(|| EngineError::target_not_found("node", node_id))?;
            node.leave();
            ctx.store.update_node(&node).await?;
            let removed = cluster.remove_member(node_id);
            if removed {
                cluster.desired_size = cluster.desired_size.saturating_sub(1);
            }
        }
        ctx.store.update_cluster(cluster).await?;
        Ok(ActionOutcome::Ok)
    }

    /// The node count a scale handler works with: the policy's plan wins,
    /// then an explicit `count` input, then 1.
    fn resolve_count(
        action: &Action,
        expect_deletion: bool,
    ) -> Result<u32, EngineError> {
        if let Some(plan) = action.decision.as_ref().and_then(|d| d.plan) {
            return match (plan, expect_deletion) {
                (AdjustmentPlan::Creation { count }, false)
                | (AdjustmentPlan::Deletion { count }, true) => Ok(count),
                _ => Err(EngineError::InvalidInput(
                    "adjustment plan does not match scale direction".into(),
                )),
            };
        }
        match action.count_input() {
            Some(count) if count > 0 => Ok(count as u32),
            Some(count) => Err(EngineError::InvalidInput(format!(
                "invalid count ({count}) for action {}",
                action.kind
            ))),
            None => Ok(1),
        }
    }

    async fn do_scale_out(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let count = Self::resolve_count(action, false)?;
        if count == 0 {
            // a best-effort clamp can legitimately land on a no-op
            return Ok(ActionOutcome::Ok);
        }
        let current = cluster.size();

        // without a policy round, enforce the size limits here
        if action.decision.is_none() {
            let max_size = cluster.max_size.unwrap_or(ctx.config.max_nodes_per_cluster);
            if current + count > max_size {
                action.status_reason = format!(
                    "node count {} exceeds the cluster maximum {max_size}",
                    current + count
                );
                return Ok(ActionOutcome::Error);
            }
        }

        info!(cluster_id = %cluster.id, count, "scaling out");
        for m in 0..count {
            self.spawn_member(action, cluster, current + m, ctx).await?;
        }
        cluster.desired_size = current + count;
        ctx.store.update_cluster(cluster).await?;
        action
            .outputs
            .insert("creation_count".into(), serde_json::json!(count));
        Ok(ActionOutcome::Ok)
    }

    async fn do_scale_in(
        &self,
        action: &mut Action,
        cluster: &mut Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let count = Self::resolve_count(action, true)?;
        if count == 0 {
            return Ok(ActionOutcome::Ok);
        }
        let current = cluster.size();

        if action.decision.is_none() {
            let floor = cluster.min_size + count;
            if current < floor {
                action.status_reason = format!(
                    "node count {} is below the cluster minimum {}",
                    current.saturating_sub(count),
                    cluster.min_size
                );
                return Ok(ActionOutcome::Error);
            }
        }

        // newest members drain first
        let victims: Vec<NodeId> = cluster
            .nodes
            .iter()
            .rev()
            .take(count as usize)
            .copied()
            .collect();

        info!(cluster_id = %cluster.id, count, "scaling in");
        for node_id in victims {
            cluster.remove_member(node_id);
            let child = Action::new(
                ActionKind::NodeDelete,
                Some(ActionTarget::node(node_id)),
                Cause::Rpc,
            )?
            .with_name(format!("node_delete_{node_id}"));
            ctx.spawn_child(action, child).await?;
        }
        cluster.desired_size = current.saturating_sub(count);
        ctx.store.update_cluster(cluster).await?;
        action
            .outputs
            .insert("deletion_count".into(), serde_json::json!(count));
        Ok(ActionOutcome::Ok)
    }

    async fn do_attach_policy(
        &self,
        action: &mut Action,
        cluster: &Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let policy_id = policy_id_input(action)?;
        let record = ctx
            .store
            .get_policy(policy_id)
            .await?
            .ok_or_else(|| EngineError::target_not_found("policy", policy_id))?;

        for binding in ctx.store.list_bindings(cluster.id).await? {
            if binding.policy_id == policy_id {
                // already attached
                return Ok(ActionOutcome::Ok);
            }
            let existing = ctx.store.get_policy(binding.policy_id).await?;
            if existing.is_some_and(|p| p.type_name == record.type_name) {
                action.status_reason = format!(
                    "a policy of type {} is already attached to cluster {}",
                    record.type_name, cluster.id
                );
                return Ok(ActionOutcome::Error);
            }
        }

        let policy = ctx.policies.build(&record)?;
        let priority = action
            .inputs
            .get("level")
            .and_then(serde_json::Value::as_i64)
            .map_or_else(|| policy.priority(), |level| level as i32);

        let mut binding = PolicyBinding::new(cluster.id, policy_id).with_priority(priority);
        if let Some(cooldown) = action
            .inputs
            .get("cooldown")
            .and_then(serde_json::Value::as_i64)
        {
            binding = binding.with_cooldown(cooldown);
        }
        binding.enabled = action
            .inputs
            .get("enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);

        ctx.store.attach_policy(binding).await?;
        Ok(ActionOutcome::Ok)
    }

    async fn do_detach_policy(
        &self,
        action: &mut Action,
        cluster: &Cluster,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let policy_id = policy_id_input(action)?;
        ctx.store.detach_policy(cluster.id, policy_id).await?;
        Ok(ActionOutcome::Ok)
    }
}

/// Parse the required `nodes` input: a non-empty array of node IDs.
fn node_ids_input(action: &Action) -> Result<Vec<NodeId>, EngineError> {
    let values = action
        .inputs
        .get("nodes")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| EngineError::InvalidInput("'nodes' input is required".into()))?;
    if values.is_empty() {
        return Err(EngineError::InvalidInput("no nodes specified".into()));
    }
    values
        .iter()
        .map(|value| {
            value
                .as_str()
                .and_then(|s| NodeId::parse(s).ok())
                .ok_or_else(|| EngineError::InvalidInput(format!("bad node id: {value}")))
        })
        .collect()
}

/// Parse the required `policy_id` input.
fn policy_id_input(action: &Action) -> Result<PolicyId, EngineError> {
    action
        .inputs
        .get("policy_id")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| PolicyId::parse(s).ok())
        .ok_or_else(|| EngineError::InvalidInput("'policy_id' input is required".into()))
}
