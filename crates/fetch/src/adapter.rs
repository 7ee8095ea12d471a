//! Transport adapters
//!
//! An adapter performs the actual I/O for a resource. Adapters are selected
//! by name: `FindOptions::adapter` overrides the resource definition's
//! default. The coordinator never interprets what an adapter returns beyond
//! handing it to the injector.

use async_trait::async_trait;
use lodestore_core::{RecordId, Result, StoreError};
use lodestore_store::{MergeStrategy, ResourceDefinition};
use serde_json::Value;

/// Options for `find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Clear the completed-fetch marker first, forcing a refetch.
    pub bypass_cache: bool,
    /// Adapter name overriding the resource's default.
    pub adapter: Option<String>,
    /// Forwarded to the merge step; not interpreted by the coordinator.
    pub merge_strategy: MergeStrategy,
}

impl FindOptions {
    /// Options that bypass the completed-fetch cache.
    pub fn bypassing_cache() -> Self {
        FindOptions {
            bypass_cache: true,
            ..Default::default()
        }
    }
}

/// Transport capability for one or more resources.
///
/// Implementations own transport concerns end to end: endpoints,
/// serialization of the raw payload into a JSON record, and timeouts. No
/// timeout is enforced above this layer.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch the raw record keyed by `id`.
    async fn find(
        &self,
        definition: &ResourceDefinition,
        id: &RecordId,
        options: &FindOptions,
    ) -> Result<Value>;

    /// Fetch the raw collection for `params`.
    ///
    /// Defaults to unsupported; adapters that only serve single records can
    /// leave this out.
    async fn find_all(&self, definition: &ResourceDefinition, params: &Value) -> Result<Value> {
        let _ = params;
        Err(StoreError::runtime(format!(
            "adapter for {} does not support collection fetches",
            definition.name
        )))
    }
}
