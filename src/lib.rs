//! lodestore: a client-side in-memory object store
//!
//! Caches individually-keyed JSON records per named resource, de-duplicates
//! asynchronous fetches for them, tracks field-level mutations for change
//! detection, and answers ad-hoc structured queries over cached collections
//! without touching the network.
//!
//! The [`DataStore`] facade wires the pieces together:
//!
//! - `lodestore-primitives` — the weight-function min-heap
//! - `lodestore-core` — records, diffs, timestamps, the error taxonomy
//! - `lodestore-store` — per-resource tables, the injector, the query engine
//! - `lodestore-fetch` — adapters and the fetch coordinator
//!
//! ```no_run
//! use lodestore::{DataStore, FindOptions, InjectOptions, ResourceDefinition};
//! use serde_json::json;
//!
//! # async fn demo(adapter: std::sync::Arc<dyn lodestore::Adapter>) -> lodestore::Result<()> {
//! let store = DataStore::new();
//! store.register_resource(ResourceDefinition::new("post"))?;
//! store.register_adapter("http", adapter);
//!
//! store.inject("post", json!({"id": 5, "author": "John"}), &InjectOptions::default())?;
//! let post = store.find("post", 5, FindOptions::default()).await?;
//! let johns = store.filter("post", &json!({"query": {"where": {"author": "John"}}}))?;
//! # let _ = (post, johns);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

use std::sync::Arc;

use serde_json::Value;

// Re-exports
pub use lodestore_core::{
    Diff, Fields, Record, RecordId, Result, SharedRecord, StoreError,
};
pub use lodestore_fetch::{Adapter, FetchCoordinator, FindOptions};
pub use lodestore_primitives::BinaryHeap;
pub use lodestore_store::{
    ImmediateScheduler, InjectOptions, Injected, MergeStrategy, ResourceDefinition,
    ResourceRegistry, UpdateScheduler,
};

/// Options for [`DataStore::filter`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Also trigger a background collection fetch for the same params. The
    /// query still answers synchronously from cached state; the fetched
    /// records land in the store for later queries.
    pub load_from_server: bool,
}

/// The assembled store: a shared resource registry plus the fetch
/// coordinator over it.
///
/// Cheap to clone; clones operate on the same underlying state.
#[derive(Clone)]
pub struct DataStore {
    registry: Arc<ResourceRegistry>,
    coordinator: FetchCoordinator,
}

impl DataStore {
    /// A store with the default immediate scheduler.
    pub fn new() -> Self {
        DataStore::builder().build()
    }

    /// Start configuring a store.
    pub fn builder() -> DataStoreBuilder {
        DataStoreBuilder { scheduler: None }
    }

    /// The underlying registry, for direct table access.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Register a resource. Re-registration of a name is a `Runtime` error.
    pub fn register_resource(&self, definition: ResourceDefinition) -> Result<()> {
        self.registry.register(definition)
    }

    /// Register a named transport adapter for `find`/`find_all`.
    pub fn register_adapter(&self, name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.coordinator.register_adapter(name, adapter);
    }

    /// Inject records into the store. See [`ResourceRegistry::inject`].
    pub fn inject(
        &self,
        resource_name: &str,
        attrs: Value,
        options: &InjectOptions,
    ) -> Result<Injected> {
        self.registry.inject(resource_name, attrs, options)
    }

    /// Synchronous index lookup.
    pub fn get(&self, resource_name: &str, id: impl Into<RecordId>) -> Result<Option<SharedRecord>> {
        self.registry.get(resource_name, &id.into())
    }

    /// Resolve a record by id, fetching it if needed. See
    /// [`FetchCoordinator::find`].
    pub async fn find(
        &self,
        resource_name: &str,
        id: impl Into<RecordId>,
        options: FindOptions,
    ) -> Result<SharedRecord> {
        self.coordinator.find(resource_name, id, options).await
    }

    /// Fetch and inject the full collection through the default adapter.
    pub async fn find_all(&self, resource_name: &str, params: Value) -> Result<Vec<SharedRecord>> {
        self.coordinator.find_all(resource_name, params).await
    }

    /// Query the cached collection. See [`ResourceRegistry::filter`].
    pub fn filter(&self, resource_name: &str, params: &Value) -> Result<Vec<SharedRecord>> {
        self.filter_with_options(resource_name, params, &FilterOptions::default())
    }

    /// Query the cached collection, optionally triggering a background
    /// collection fetch for the same params.
    ///
    /// The query itself is synchronous and answers from cached state only.
    /// With `load_from_server` set, a `find_all` is spawned onto the ambient
    /// tokio runtime; without a runtime the trigger is skipped with a
    /// warning and the cached answer still returns.
    pub fn filter_with_options(
        &self,
        resource_name: &str,
        params: &Value,
        options: &FilterOptions,
    ) -> Result<Vec<SharedRecord>> {
        let records = self.registry.filter(resource_name, params)?;

        if options.load_from_server {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let coordinator = self.coordinator.clone();
                    let resource_name = resource_name.to_string();
                    let params = params.clone();
                    handle.spawn(async move {
                        if let Err(err) = coordinator.find_all(&resource_name, params).await {
                            tracing::warn!(
                                resource = %resource_name,
                                error = %err,
                                "background collection fetch failed"
                            );
                        }
                    });
                }
                Err(_) => {
                    tracing::warn!(
                        resource = %resource_name,
                        "no async runtime; skipping background collection fetch"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Timestamp of the last mutation of `id`, or of the whole collection.
    pub fn last_modified(
        &self,
        resource_name: &str,
        id: Option<&RecordId>,
    ) -> Result<u64> {
        self.registry.last_modified(resource_name, id)
    }

    /// The most recent computed diff for `id`.
    pub fn change_log(&self, resource_name: &str, id: impl Into<RecordId>) -> Result<Option<Diff>> {
        self.registry.change_log(resource_name, &id.into())
    }

    /// Evict completed-fetch markers older than `cutoff` so later `find`s
    /// refetch those ids. Returns how many were evicted.
    pub fn evict_completed_before(&self, resource_name: &str, cutoff: u64) -> Result<usize> {
        self.registry.evict_completed_before(resource_name, cutoff)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        DataStore::new()
    }
}

/// Builder for [`DataStore`].
pub struct DataStoreBuilder {
    scheduler: Option<Arc<dyn UpdateScheduler>>,
}

impl DataStoreBuilder {
    /// Run injection work through the host's update cycle instead of the
    /// default immediate scheduler.
    pub fn scheduler(mut self, scheduler: Arc<dyn UpdateScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Assemble the store.
    pub fn build(self) -> DataStore {
        let registry = Arc::new(match self.scheduler {
            Some(scheduler) => ResourceRegistry::with_scheduler(scheduler),
            None => ResourceRegistry::new(),
        });
        let coordinator = FetchCoordinator::new(Arc::clone(&registry));
        DataStore {
            registry,
            coordinator,
        }
    }
}
