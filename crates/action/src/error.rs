//! Action construction and transition errors.

use thiserror::Error;

/// Errors raised when constructing or transitioning an action.
///
/// Construction errors are raised synchronously and never persisted as
/// running actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// No target was supplied for the action.
    #[error("action {kind} requires a target")]
    MissingTarget {
        /// The kind being constructed.
        kind: String,
    },

    /// A policy-family action was constructed without a policy reference.
    #[error("action {kind} requires both a cluster and a policy reference")]
    MissingPolicy {
        /// The kind being constructed.
        kind: String,
    },

    /// The kind is not in the recognized set for the supplied target.
    #[error("action {kind} is not supported against {target}")]
    KindTargetMismatch {
        /// The kind being constructed.
        kind: String,
        /// The mismatched target.
        target: String,
    },

    /// A state transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },
}
