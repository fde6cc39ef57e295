//! Handlers for the policy action family.

use async_trait::async_trait;
use corral_action::{Action, ActionKind, ActionOutcome, ActionTarget};
use corral_storage::StorageGateway;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handler::ActionHandler;

/// Executes every `POLICY_*` kind. These only touch the binding record;
/// the policy object itself is immutable and shared.
pub struct PolicyHandler;

#[async_trait]
impl ActionHandler for PolicyHandler {
    async fn execute(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        let ActionTarget::ClusterPolicy {
            cluster_id,
            policy_id,
        } = action.target
        else {
            return Err(EngineError::InvalidInput(
                "policy action requires a cluster-policy target".into(),
            ));
        };
        let mut binding = ctx
            .store
            .get_binding(cluster_id, policy_id)
            .await?
            .ok_or_else(|| EngineError::target_not_found("binding", policy_id))?;

        match action.kind {
            ActionKind::PolicyEnable => binding.enabled = true,
            ActionKind::PolicyDisable => binding.enabled = false,
            ActionKind::PolicyUpdate => {
                if let Some(cooldown) = action
                    .inputs
                    .get("cooldown")
                    .and_then(serde_json::Value::as_i64)
                {
                    binding.cooldown_override = Some(cooldown);
                }
                if let Some(level) = action
                    .inputs
                    .get("level")
                    .and_then(serde_json::Value::as_i64)
                {
                    binding.priority = level as i32;
                }
            }
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "{other} is not a policy action"
                )));
            }
        }

        ctx.store.update_binding(&binding).await?;
        Ok(ActionOutcome::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_action::{ActionStatus, Cause};
    use corral_cluster::PolicyBinding;
    use corral_core::{ClusterId, PolicyId};
    use corral_policy::PolicyRegistry;
    use corral_storage::{MemoryStore, StorageGateway};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn make_context() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(MemoryStore::new()),
            crate::EngineConfig::default(),
            Arc::new(PolicyRegistry::builtin()),
            Arc::new(Notify::new()),
        )
    }

    fn policy_action(kind: ActionKind, cluster_id: ClusterId, policy_id: PolicyId) -> Action {
        let mut action = Action::new(
            kind,
            Some(ActionTarget::cluster_policy(cluster_id, policy_id)),
            Cause::Rpc,
        )
        .unwrap();
        action.set_status(ActionStatus::Ready).unwrap();
        action.set_status(ActionStatus::Running).unwrap();
        action
    }

    async fn seeded_binding(ctx: &ExecutionContext) -> PolicyBinding {
        let binding = PolicyBinding::new(ClusterId::v4(), PolicyId::v4());
        ctx.store.attach_policy(binding.clone()).await.unwrap();
        binding
    }

    #[tokio::test]
    async fn disable_then_enable() {
        let ctx = make_context();
        let binding = seeded_binding(&ctx).await;

        let mut action = policy_action(
            ActionKind::PolicyDisable,
            binding.cluster_id,
            binding.policy_id,
        );
        PolicyHandler.execute(&mut action, &ctx).await.unwrap();
        let stored = ctx
            .store
            .get_binding(binding.cluster_id, binding.policy_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.enabled);

        let mut action = policy_action(
            ActionKind::PolicyEnable,
            binding.cluster_id,
            binding.policy_id,
        );
        PolicyHandler.execute(&mut action, &ctx).await.unwrap();
        let stored = ctx
            .store
            .get_binding(binding.cluster_id, binding.policy_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.enabled);
    }

    #[tokio::test]
    async fn update_overrides_binding_fields() {
        let ctx = make_context();
        let binding = seeded_binding(&ctx).await;

        let mut action = policy_action(
            ActionKind::PolicyUpdate,
            binding.cluster_id,
            binding.policy_id,
        )
        .with_input("cooldown", serde_json::json!(90))
        .with_input("level", serde_json::json!(10));
        let outcome = PolicyHandler.execute(&mut action, &ctx).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Ok);

        let stored = ctx
            .store
            .get_binding(binding.cluster_id, binding.policy_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.cooldown_override, Some(90));
        assert_eq!(stored.priority, 10);
    }

    #[tokio::test]
    async fn missing_binding_is_an_error() {
        let ctx = make_context();
        let mut action =
            policy_action(ActionKind::PolicyEnable, ClusterId::v4(), PolicyId::v4());
        let err = PolicyHandler.execute(&mut action, &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::TargetNotFound { .. }));
    }
}
