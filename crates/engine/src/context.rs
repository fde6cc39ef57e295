//! Runtime context handed to executing handlers.

use std::sync::Arc;

use corral_action::{Action, Cause};
use corral_core::ActionId;
use corral_policy::{PolicyContext, PolicyRegistry};
use corral_storage::StorageGateway;
use tokio::sync::Notify;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Shared state a handler needs while executing one action: the record
/// store, the engine configuration, the policy registry (for attach-time
/// defaults), and the wakeup channel for newly spawned children.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The durable record store.
    pub store: Arc<dyn StorageGateway>,
    /// Engine configuration.
    pub config: EngineConfig,
    /// Registered policy types.
    pub policies: Arc<PolicyRegistry>,
    notify: Arc<Notify>,
}

impl ExecutionContext {
    /// Create a context.
    #[must_use]
    pub fn new(
        store: Arc<dyn StorageGateway>,
        config: EngineConfig,
        policies: Arc<PolicyRegistry>,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            config,
            policies,
            notify,
        }
    }

    /// The context the policy pipeline sees.
    #[must_use]
    pub fn policy_context(&self) -> PolicyContext {
        PolicyContext::new(self.store.clone(), self.config.max_nodes_per_cluster)
    }

    /// Wake idle workers; safe to call redundantly.
    pub fn notify_ready(&self) {
        self.notify.notify_waiters();
    }

    /// Spawn a child action from within a running parent.
    ///
    /// The child is stamped with the parent as its cause, gets the parent
    /// recorded in `depended_by` for provenance, inherits the configured
    /// timeout, and is stored ready for any worker to claim. The child's id
    /// is appended to the parent's `children` output.
    pub async fn spawn_child(
        &self,
        parent: &mut Action,
        mut child: Action,
    ) -> Result<ActionId, EngineError> {
        child.cause = Cause::DerivedFrom {
            action_id: parent.id,
        };
        child.depended_by.push(parent.id);
        child.timeout = self.config.default_action_timeout;
        child.analyze_dependencies()?;

        let id = self.store.create_action(child).await?;
        debug!(parent = %parent.id, child = %id, "spawned child action");

        if let Some(children) = parent
            .outputs
            .entry("children")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()))
            .as_array_mut()
        {
            children.push(serde_json::Value::String(id.to_string()));
        }

        self.notify.notify_waiters();
        Ok(id)
    }
}
