//! Policy error types.

use thiserror::Error;

/// Errors raised when constructing or registering policies.
///
/// These never flow through the hook path — `pre_op` converts its own
/// failures into rejecting decisions instead of returning errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy specification document failed validation.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// No constructor is registered for the policy type.
    #[error("unknown policy type: {0}")]
    UnknownType(String),

    /// The specification document could not be parsed.
    #[error("spec parse: {0}")]
    SpecParse(#[from] serde_json::Error),
}
