//! The surface the orchestration layer calls.

use std::sync::Arc;

use corral_action::{Action, ActionKind, ActionStatus, ActionTarget, Cause};
use corral_core::ActionId;
use corral_storage::StorageGateway;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::graph::DependencyGraph;

/// Core-exposed contract for creating and steering actions.
///
/// The request-handling layer above this is pure CRUD glue; everything that
/// touches the execution engine goes through these methods.
pub struct EngineService {
    dispatcher: Arc<Dispatcher>,
}

impl EngineService {
    /// Create a service over a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Build, validate, and persist a new action, then hint the workers.
    ///
    /// Construction failures (missing target, missing policy reference,
    /// kind/target mismatch) surface synchronously and nothing is persisted.
    pub async fn create_action(
        &self,
        kind: ActionKind,
        target: Option<ActionTarget>,
        inputs: serde_json::Map<String, serde_json::Value>,
        cause: Cause,
    ) -> Result<ActionId, EngineError> {
        let context = self.dispatcher.context();
        let mut action = Action::new(kind, target, cause)?
            .with_inputs(inputs)
            .with_timeout(context.config.default_action_timeout);
        action.analyze_dependencies()?;

        let id = context.store.create_action(action).await?;
        info!(action_id = %id, kind = %kind, "action created");
        self.dispatcher.notify_ready();
        Ok(id)
    }

    /// Persist a pre-built action (dependencies, schedule, interval already
    /// set by the caller).
    pub async fn submit(&self, mut action: Action) -> Result<ActionId, EngineError> {
        if action.status == ActionStatus::Init {
            action.analyze_dependencies()?;
        }
        let id = self.dispatcher.context().store.create_action(action).await?;
        self.dispatcher.notify_ready();
        Ok(id)
    }

    /// Persist a batch of related actions atomically from the caller's
    /// perspective: the in-batch dependency graph is validated acyclic,
    /// reverse edges are completed, and each action's initial readiness is
    /// computed before anything is stored.
    pub async fn submit_batch(
        &self,
        mut actions: Vec<Action>,
    ) -> Result<Vec<ActionId>, EngineError> {
        let graph = DependencyGraph::from_actions(&actions)?;
        graph.validate()?;

        // complete the reverse edges for in-batch dependencies
        for index in 0..actions.len() {
            let id = actions[index].id;
            for dep in actions[index].depends_on.clone() {
                if let Some(dependency) = actions.iter_mut().find(|a| a.id == dep)
                    && !dependency.depended_by.contains(&id)
                {
                    dependency.depended_by.push(id);
                }
            }
        }

        let store = &self.dispatcher.context().store;
        let mut ids = Vec::with_capacity(actions.len());
        for mut action in actions {
            if action.status == ActionStatus::Init {
                action.analyze_dependencies()?;
            }
            ids.push(store.create_action(action).await?);
        }
        debug!(count = ids.len(), "batch submitted");
        self.dispatcher.notify_ready();
        Ok(ids)
    }

    /// Asynchronous hint that a ready action exists. Safe to call
    /// redundantly and safe to drop — workers also poll.
    pub fn notify_ready(&self, action_id: ActionId) {
        debug!(action_id = %action_id, "ready hint");
        self.dispatcher.notify_ready();
    }

    /// Request cancellation of an action.
    pub async fn cancel_action(&self, id: ActionId) -> Result<(), EngineError> {
        self.dispatcher.cancel_action(id).await
    }

    /// Fetch an action record.
    pub async fn get_action(&self, id: ActionId) -> Result<Option<Action>, EngineError> {
        Ok(self.dispatcher.context().store.get_action(id).await?)
    }
}
