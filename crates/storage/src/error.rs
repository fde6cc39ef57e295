//! Storage gateway error types.

use thiserror::Error;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The record kind ("action", "cluster", …).
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// A write conflicted with the record's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend itself failed.
    #[error("backend: {0}")]
    Backend(String),
}

impl StorageError {
    /// Convenience constructor for missing records.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
