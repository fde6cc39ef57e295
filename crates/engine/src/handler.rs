//! The kind → handler table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use corral_action::{Action, ActionKind, ActionOutcome};

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handlers::{ClusterHandler, CustomHandler, NodeHandler, PolicyHandler};

/// Type-specific execution logic for one or more action kinds.
///
/// Handlers must be idempotent-safe: the dispatcher may re-invoke them
/// after a crash that happened before the terminal status committed
/// (at-least-once semantics).
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action, mutating aggregates and/or spawning children
    /// through the context.
    async fn execute(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError>;
}

/// Maps every action kind to its handler.
///
/// The dispatcher refuses to start until [`HandlerRegistry::validate`]
/// confirms the table is total — an unhandled kind is a deployment error,
/// not something to discover when the first such action is claimed.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in handlers for every kind.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        let cluster = Arc::new(ClusterHandler);
        for kind in ActionKind::ALL {
            let handler: Arc<dyn ActionHandler> = match kind.family() {
                corral_action::ActionFamily::Cluster => cluster.clone(),
                corral_action::ActionFamily::Node => Arc::new(NodeHandler),
                corral_action::ActionFamily::Policy => Arc::new(PolicyHandler),
                corral_action::ActionFamily::Custom => Arc::new(CustomHandler),
            };
            registry.register(kind, handler);
        }
        registry
    }

    /// Register a handler for a kind. Overwrites any existing entry.
    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Look up the handler for a kind.
    #[must_use]
    pub fn get(&self, kind: ActionKind) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(&kind)
    }

    /// Verify every kind has a handler. Called at dispatcher startup.
    pub fn validate(&self) -> Result<(), EngineError> {
        let missing: Vec<String> = ActionKind::ALL
            .iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .map(ToString::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::MissingHandlers {
                kinds: missing.join(", "),
            })
        }
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("count", &self.handlers.len())
            .finish()
    }
}
