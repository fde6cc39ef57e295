//! Persisted policy configuration records.

use chrono::{DateTime, Utc};
use corral_core::PolicyId;
use serde::{Deserialize, Serialize};

/// The stored form of a policy: immutable configuration shared across
/// clusters. Runtime state lives on the per-cluster binding, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Unique policy identifier.
    pub id: PolicyId,
    /// Human-readable name.
    pub name: String,
    /// Registered policy type this record instantiates
    /// (e.g. `"corral.policy.scaling"`).
    pub type_name: String,
    /// The validated, type-specific specification document.
    pub spec: serde_json::Value,
    /// When the policy was created.
    pub created_at: DateTime<Utc>,
}

impl PolicyRecord {
    /// Create a new policy record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        spec: serde_json::Value,
    ) -> Self {
        Self {
            id: PolicyId::v4(),
            name: name.into(),
            type_name: type_name.into(),
            spec,
            created_at: Utc::now(),
        }
    }
}
