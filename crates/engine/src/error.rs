//! Engine error types.

use corral_action::ActionError;
use corral_policy::PolicyError;
use corral_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the dispatcher, handlers, and service surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Action construction or transition failed.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The storage gateway failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A policy could not be instantiated.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The handler registry is missing kinds; detected at startup.
    #[error("no handler registered for: {kinds}")]
    MissingHandlers {
        /// Comma-separated unhandled kinds.
        kinds: String,
    },

    /// A batch of actions contains a dependency cycle.
    #[error("dependency cycle detected")]
    DependencyCycle,

    /// A batch action depends on an action outside the batch and the store.
    #[error("unknown dependency: {0}")]
    UnknownDependency(corral_core::ActionId),

    /// A record the handler needs does not exist.
    #[error("{entity} not found: {id}")]
    TargetNotFound {
        /// The record kind ("cluster", "node", …).
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// A handler received malformed or missing inputs.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Convenience constructor for missing records.
    pub fn target_not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::TargetNotFound {
            entity,
            id: id.to_string(),
        }
    }
}
