//! Type-erased registry mapping policy type names to constructors.

use std::collections::HashMap;
use std::sync::Arc;

use corral_storage::PolicyRecord;

use crate::error::PolicyError;
use crate::policy::Policy;
use crate::scaling::{ScalingPolicy, SCALING_POLICY_TYPE};

/// Builds a policy instance from its stored record.
pub type PolicyConstructor = fn(&PolicyRecord) -> Result<Arc<dyn Policy>, PolicyError>;

/// Maps policy type names to constructors.
///
/// The engine populates this at startup; the hook pipeline uses it to turn
/// the policy records referenced by a cluster's bindings into live
/// instances.
#[derive(Default)]
pub struct PolicyRegistry {
    constructors: HashMap<String, PolicyConstructor>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in policy types registered.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SCALING_POLICY_TYPE, |record| {
            Ok(Arc::new(ScalingPolicy::from_record(record)?) as Arc<dyn Policy>)
        });
        registry
    }

    /// Register a constructor. Overwrites any existing entry for the type.
    pub fn register(&mut self, type_name: impl Into<String>, constructor: PolicyConstructor) {
        self.constructors.insert(type_name.into(), constructor);
    }

    /// Check whether a type is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Instantiate a policy from its stored record.
    pub fn build(&self, record: &PolicyRecord) -> Result<Arc<dyn Policy>, PolicyError> {
        let constructor = self
            .constructors
            .get(&record.type_name)
            .ok_or_else(|| PolicyError::UnknownType(record.type_name.clone()))?;
        constructor(record)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
