//! Resource registry
//!
//! Registration happens once per resource name, before any store operation
//! for that name; definitions are immutable afterwards. The registry also
//! carries the scheduler capability the injector runs under.

use crate::definition::ResourceDefinition;
use crate::resource::Resource;
use crate::scheduler::{ImmediateScheduler, UpdateScheduler};
use dashmap::DashMap;
use lodestore_core::{Result, StoreError};
use std::sync::Arc;

/// Registry of resources plus the scheduler capability.
///
/// This is the shared state object: the injector and query engine are
/// implemented as methods on it (see `inject` and `query` modules), and the
/// fetch layer holds an `Arc` to it.
pub struct ResourceRegistry {
    resources: DashMap<String, Arc<Resource>>,
    scheduler: Arc<dyn UpdateScheduler>,
}

impl ResourceRegistry {
    /// Registry with the immediate (host-less) scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(ImmediateScheduler::new()))
    }

    /// Registry with an injected host scheduler.
    pub fn with_scheduler(scheduler: Arc<dyn UpdateScheduler>) -> Self {
        ResourceRegistry {
            resources: DashMap::new(),
            scheduler,
        }
    }

    /// Register a resource definition.
    ///
    /// Fails with `IllegalArgument` for an empty name or identifying field,
    /// and with `Runtime` when the name is already taken.
    pub fn register(&self, definition: ResourceDefinition) -> Result<()> {
        if definition.name.is_empty() {
            return Err(StoreError::illegal_argument("definition.name: must not be empty"));
        }
        if definition.id_attribute.is_empty() {
            return Err(StoreError::illegal_argument(
                "definition.id_attribute: must not be empty",
            ));
        }
        let name = definition.name.clone();
        match self.resources.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::runtime(format!(
                "{name} is already a registered resource"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Resource::new(definition)));
                tracing::debug!(resource = %name, "registered resource");
                Ok(())
            }
        }
    }

    /// Look up a registered resource, or fail with the standard `Runtime`
    /// error for unknown names.
    pub fn resource(&self, name: &str) -> Result<Arc<Resource>> {
        self.resources
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::unregistered_resource(name))
    }

    /// True when `name` has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// The scheduler capability injections run under.
    pub fn scheduler(&self) -> &Arc<dyn UpdateScheduler> {
        &self.scheduler
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = ResourceRegistry::new();
        registry.register(ResourceDefinition::new("post")).unwrap();

        assert!(registry.is_registered("post"));
        assert_eq!(registry.resource("post").unwrap().definition.name, "post");
    }

    #[test]
    fn test_unregistered_resource_is_runtime_error() {
        let registry = ResourceRegistry::new();
        let err = registry.resource("ghost").unwrap_err();
        assert!(err.is_runtime());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = ResourceRegistry::new();
        registry.register(ResourceDefinition::new("post")).unwrap();

        let err = registry.register(ResourceDefinition::new("post")).unwrap_err();
        assert!(err.is_runtime());
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = ResourceRegistry::new();
        let err = registry.register(ResourceDefinition::new("")).unwrap_err();
        assert!(err.is_illegal_argument());
    }
}
