//! Per-resource store tables
//!
//! One `Resource` exists per registered resource name. Its state is the
//! shared mutable heart of the store: the id index and the insertion-ordered
//! collection hold identical `SharedRecord` handles, snapshots and the change
//! log back deterministic diffing, and the fetch tables gate de-duplication.

use crate::definition::ResourceDefinition;
use futures::future::{BoxFuture, Shared};
use lodestore_core::{update_timestamp, Diff, Record, RecordId, Result, SharedRecord};
use lodestore_primitives::BinaryHeap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;

/// Cloneable handle to an in-flight fetch.
///
/// Stored in `pending_fetches`; every concurrent `find` for the same id
/// awaits a clone of the same shared future, so exactly one adapter call is
/// issued per outstanding `(resource, id)` pair.
pub type FetchFuture = Shared<BoxFuture<'static, Result<SharedRecord>>>;

/// Completion marker fed to the recency heap.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStamp {
    /// Record the fetch completed for.
    pub id: RecordId,
    /// Completion time in milliseconds.
    pub completed_at: u64,
}

/// The mutable tables for one resource.
pub struct ResourceState {
    /// id -> record. Identity-shared with `collection`.
    pub index: FxHashMap<RecordId, SharedRecord>,
    /// Insertion-ordered records, same handles as `index`.
    pub collection: Vec<SharedRecord>,
    /// id -> last committed field snapshot, the diffing baseline.
    pub previous_snapshot: FxHashMap<RecordId, Record>,
    /// id -> most recent computed diff.
    pub change_log: FxHashMap<RecordId, Diff>,
    /// id -> last modification timestamp (ms, strictly monotonic per id).
    pub modified: FxHashMap<RecordId, u64>,
    /// Timestamp of the last mutation to any member.
    pub collection_modified: u64,
    /// id -> in-flight fetch. Presence means a fetch is outstanding.
    pub pending_fetches: FxHashMap<RecordId, FetchFuture>,
    /// id -> last successful fetch completion time. Absence means "never
    /// successfully fetched", distinct from "cached via direct injection".
    pub completed_fetches: FxHashMap<RecordId, u64>,
    /// Completion stamps ordered by recency, backing staleness eviction.
    pub fetch_recency: BinaryHeap<FetchStamp, u64>,
}

impl ResourceState {
    pub(crate) fn new() -> Self {
        ResourceState {
            index: FxHashMap::default(),
            collection: Vec::new(),
            previous_snapshot: FxHashMap::default(),
            change_log: FxHashMap::default(),
            modified: FxHashMap::default(),
            collection_modified: 0,
            pending_fetches: FxHashMap::default(),
            completed_fetches: FxHashMap::default(),
            fetch_recency: BinaryHeap::new(|stamp: &FetchStamp| stamp.completed_at),
        }
    }

    /// Commit the record's current state for `id`: compute the diff against
    /// the previous snapshot, store it, advance the snapshot and bump both
    /// modification timestamps.
    ///
    /// Diffing is forced here, synchronously, so the change log and
    /// timestamps reflect the mutation from the caller's perspective.
    pub(crate) fn commit(&mut self, id: &RecordId) {
        let current = match self.index.get(id) {
            Some(record) => record.snapshot(),
            None => return,
        };
        let baseline = self.previous_snapshot.entry(id.clone()).or_default();
        let diff = Diff::between(baseline, &current);
        *baseline = current;
        self.change_log.insert(id.clone(), diff);

        let previous = self.modified.get(id).copied().unwrap_or(0);
        self.modified.insert(id.clone(), update_timestamp(previous));
        self.collection_modified = update_timestamp(self.collection_modified);
    }

    /// Drop completion markers older than `cutoff`, returning how many were
    /// evicted. Evicted ids are treated as uncached by the next `find`.
    pub(crate) fn evict_completed_before(&mut self, cutoff: u64) -> usize {
        let mut evicted = 0;
        while let Some(stamp) = self.fetch_recency.peek() {
            if stamp.completed_at >= cutoff {
                break;
            }
            let stamp = match self.fetch_recency.pop() {
                Some(stamp) => stamp,
                None => break,
            };
            // A newer fetch may have restamped this id; only clear the
            // marker the stamp actually refers to.
            if self.completed_fetches.get(&stamp.id) == Some(&stamp.completed_at) {
                self.completed_fetches.remove(&stamp.id);
                evicted += 1;
            }
        }
        evicted
    }
}

/// A registered resource: immutable definition plus lockable state.
pub struct Resource {
    /// The registration-time definition.
    pub definition: ResourceDefinition,
    /// The mutable tables.
    pub state: RwLock<ResourceState>,
}

impl Resource {
    pub(crate) fn new(definition: ResourceDefinition) -> Self {
        Resource {
            definition,
            state: RwLock::new(ResourceState::new()),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shared(value: serde_json::Value) -> SharedRecord {
        match value {
            serde_json::Value::Object(map) => SharedRecord::new(Record::from_fields(map)),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_commit_records_diff_and_bumps_timestamps() {
        let mut state = ResourceState::new();
        let id = RecordId::from(1);
        let record = shared(json!({"id": 1, "name": "a"}));
        state.index.insert(id.clone(), record.clone());
        state.collection.push(record.clone());

        state.commit(&id);
        let first_modified = state.modified[&id];
        assert!(first_modified > 0);
        // Everything is new against the empty baseline.
        assert_eq!(state.change_log[&id].added.len(), 2);

        record.write().insert("name".to_string(), json!("b"));
        state.commit(&id);

        assert!(state.modified[&id] > first_modified);
        let diff = &state.change_log[&id];
        assert_eq!(diff.changed.get("name"), Some(&json!("b")));
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_evict_completed_before_clears_stale_markers() {
        let mut state = ResourceState::new();
        for (id, at) in [(1, 100u64), (2, 200), (3, 300)] {
            let id = RecordId::from(id);
            state.completed_fetches.insert(id.clone(), at);
            state.fetch_recency.push(FetchStamp { id, completed_at: at });
        }

        assert_eq!(state.evict_completed_before(250), 2);
        assert!(!state.completed_fetches.contains_key(&RecordId::from(1)));
        assert!(!state.completed_fetches.contains_key(&RecordId::from(2)));
        assert!(state.completed_fetches.contains_key(&RecordId::from(3)));
    }

    #[test]
    fn test_resource_debug_renders_definition() {
        let resource = Resource::new(ResourceDefinition::new("post"));
        let rendered = format!("{resource:?}");
        assert!(rendered.contains("post"));
    }

    #[test]
    fn test_evict_skips_restamped_ids() {
        let mut state = ResourceState::new();
        let id = RecordId::from(1);
        state.fetch_recency.push(FetchStamp { id: id.clone(), completed_at: 100 });
        // The id was fetched again after the stamp was recorded.
        state.completed_fetches.insert(id.clone(), 500);

        assert_eq!(state.evict_completed_before(250), 0);
        assert_eq!(state.completed_fetches.get(&id), Some(&500));
    }
}
