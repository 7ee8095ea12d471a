//! Resource definitions
//!
//! A resource is registered once with its name, identifying field and default
//! adapter, and is immutable afterwards. An optional custom filter replaces
//! built-in predicate evaluation wholesale for that resource.

use lodestore_core::{Record, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom predicate evaluation for one resource.
///
/// Receives `(resource_name, where_clause, record)` and decides membership.
/// Errors it returns wrap as `Unhandled` at the query boundary.
pub type CustomFilter = dyn Fn(&str, &Value, &Record) -> Result<bool> + Send + Sync;

/// Registration input for one resource type.
///
/// Built with the `with_*` methods; defaults are `"id"` for the identifying
/// field and `"http"` for the adapter name.
#[derive(Clone)]
pub struct ResourceDefinition {
    /// Resource name, e.g. `"post"`.
    pub name: String,
    /// Field whose value uniquely keys a record within this resource.
    pub id_attribute: String,
    /// Adapter used by `find` when the caller names none.
    pub default_adapter: String,
    /// Replacement for built-in `where` evaluation, if any.
    pub custom_filter: Option<Arc<CustomFilter>>,
}

impl ResourceDefinition {
    /// Definition with default identifying field and adapter.
    pub fn new(name: impl Into<String>) -> Self {
        ResourceDefinition {
            name: name.into(),
            id_attribute: "id".to_string(),
            default_adapter: "http".to_string(),
            custom_filter: None,
        }
    }

    /// Override the identifying field.
    pub fn with_id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    /// Override the default adapter name.
    pub fn with_default_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.default_adapter = adapter.into();
        self
    }

    /// Replace built-in predicate evaluation for this resource.
    pub fn with_custom_filter(
        mut self,
        filter: impl Fn(&str, &Value, &Record) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.custom_filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("name", &self.name)
            .field("id_attribute", &self.id_attribute)
            .field("default_adapter", &self.default_adapter)
            .field("custom_filter", &self.custom_filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let def = ResourceDefinition::new("post");
        assert_eq!(def.name, "post");
        assert_eq!(def.id_attribute, "id");
        assert_eq!(def.default_adapter, "http");
        assert!(def.custom_filter.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let def = ResourceDefinition::new("user")
            .with_id_attribute("uuid")
            .with_default_adapter("local")
            .with_custom_filter(|_, _, _| Ok(true));

        assert_eq!(def.id_attribute, "uuid");
        assert_eq!(def.default_adapter, "local");
        assert!(def.custom_filter.is_some());
    }
}
