//! The injector
//!
//! `inject` merges externally- or internally-sourced records into the
//! resource's tables, computing field-level diffs and bumping modification
//! timestamps. Injecting does not touch the network; the fetch layer calls
//! into it with raw adapter results.
//!
//! Invariants upheld here:
//! - index and collection always share identical record handles per id
//! - every indexed id has a previous-snapshot entry
//! - a mutation that would change a record's identifying field is rejected
//!   before any merge, never committed in a corrupted state

use crate::registry::ResourceRegistry;
use crate::resource::Resource;
use lodestore_core::{
    value_type_name, Record, RecordId, Result, SharedRecord, StoreError,
};
use serde_json::Value;
use std::sync::Arc;

/// How an incoming record combines with an already-cached one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Shallow-merge incoming fields over the existing record (default).
    #[default]
    MergeWithExisting,
    /// Replace the existing record's fields wholesale.
    Replace,
}

/// Options for `inject`.
#[derive(Debug, Clone, Default)]
pub struct InjectOptions {
    /// Merge strategy for records already in the cache.
    pub merge_strategy: MergeStrategy,
}

/// What `inject` returns: handles identity-tied to the store's internal
/// records, shaped like the input (single object or array).
#[derive(Debug, Clone)]
pub enum Injected {
    /// A single object was injected.
    One(SharedRecord),
    /// An array was injected, element handles in input order.
    Many(Vec<SharedRecord>),
}

impl Injected {
    /// The injected handles as a vector, regardless of input shape.
    pub fn into_records(self) -> Vec<SharedRecord> {
        match self {
            Injected::One(record) => vec![record],
            Injected::Many(records) => records,
        }
    }

    /// The single injected handle, when the input was a single object.
    pub fn one(&self) -> Option<&SharedRecord> {
        match self {
            Injected::One(record) => Some(record),
            Injected::Many(_) => None,
        }
    }
}

impl ResourceRegistry {
    /// Inject `attrs` (an object, or an array of objects) into the store.
    ///
    /// New ids create fresh records appended to the collection; existing ids
    /// merge in place, preserving record identity. Each commit computes the
    /// diff against the previous snapshot synchronously and bumps the per-id
    /// and collection timestamps.
    ///
    /// The merge-and-diff work runs inside the host update cycle: in place if
    /// one is active, otherwise through the scheduler capability.
    ///
    /// # Errors
    ///
    /// - `Runtime`: unregistered resource (pre-mutation); an element missing
    ///   the identifying field (prior array elements stay committed); a
    ///   mutation that would change a cached record's identifying field
    /// - `IllegalArgument`: `attrs` is not an object or array of objects
    /// - `Unhandled`: any other failure during merge/diff
    pub fn inject(
        &self,
        resource_name: &str,
        attrs: Value,
        options: &InjectOptions,
    ) -> Result<Injected> {
        let resource = self.resource(resource_name)?;
        let (items, many) = validate_attrs(&attrs)?;

        let scheduler = Arc::clone(self.scheduler());
        let mut outcome: Option<Result<Vec<SharedRecord>>> = None;
        if scheduler.is_in_update_cycle() {
            outcome = Some(inject_items(&resource, items, options));
        } else {
            let mut items_slot = Some(items);
            scheduler.run_in_update_cycle(&mut || {
                if let Some(items) = items_slot.take() {
                    outcome = Some(inject_items(&resource, items, options));
                }
            });
        }

        let records = outcome
            .unwrap_or_else(|| {
                Err(StoreError::unhandled(
                    "scheduler did not run the injection work",
                ))
            })
            .map_err(StoreError::into_unhandled)?;

        if many {
            Ok(Injected::Many(records))
        } else {
            match records.into_iter().next() {
                Some(record) => Ok(Injected::One(record)),
                None => Err(StoreError::unhandled("injection committed no record")),
            }
        }
    }

    /// Synchronous index lookup.
    ///
    /// # Errors
    ///
    /// `Runtime` for an unregistered resource.
    pub fn get(&self, resource_name: &str, id: &RecordId) -> Result<Option<SharedRecord>> {
        let resource = self.resource(resource_name)?;
        let state = resource.state.read();
        Ok(state.index.get(id).cloned())
    }

    /// Timestamp of the last mutation of `id`, or of the collection when no
    /// id is given.
    ///
    /// An id with no recorded mutation reads as 0 (and is lazily seeded so
    /// later bumps stay strictly monotonic against it).
    ///
    /// # Errors
    ///
    /// `Runtime` for an unregistered resource.
    pub fn last_modified(&self, resource_name: &str, id: Option<&RecordId>) -> Result<u64> {
        let resource = self.resource(resource_name)?;
        match id {
            Some(id) => {
                let mut state = resource.state.write();
                Ok(*state.modified.entry(id.clone()).or_insert(0))
            }
            None => Ok(resource.state.read().collection_modified),
        }
    }

    /// The most recent computed diff for `id`, if any commit touched it.
    ///
    /// # Errors
    ///
    /// `Runtime` for an unregistered resource.
    pub fn change_log(&self, resource_name: &str, id: &RecordId) -> Result<Option<lodestore_core::Diff>> {
        let resource = self.resource(resource_name)?;
        let state = resource.state.read();
        Ok(state.change_log.get(id).cloned())
    }

    /// Evict completed-fetch markers older than `cutoff` (ms), returning how
    /// many were cleared. Evicted ids are refetched by the next `find`.
    ///
    /// # Errors
    ///
    /// `Runtime` for an unregistered resource.
    pub fn evict_completed_before(&self, resource_name: &str, cutoff: u64) -> Result<usize> {
        let resource = self.resource(resource_name)?;
        let mut state = resource.state.write();
        Ok(state.evict_completed_before(cutoff))
    }
}

/// Check `attrs` is an object or an array of objects, pre-mutation.
fn validate_attrs(attrs: &Value) -> Result<(Vec<Record>, bool)> {
    match attrs {
        Value::Object(map) => Ok((vec![Record::from_fields(map.clone())], false)),
        Value::Array(values) => {
            let mut items = Vec::with_capacity(values.len());
            for (i, element) in values.iter().enumerate() {
                match element {
                    Value::Object(map) => items.push(Record::from_fields(map.clone())),
                    other => {
                        return Err(StoreError::illegal_argument_with_detail(
                            format!("attrs[{i}]: must be an object"),
                            format!("expected object, actual {}", value_type_name(other)),
                        ))
                    }
                }
            }
            Ok((items, true))
        }
        other => Err(StoreError::illegal_argument_with_detail(
            "attrs: must be an object or an array",
            format!("expected object|array, actual {}", value_type_name(other)),
        )),
    }
}

/// Inject the elements in input order. On error, elements already committed
/// stay committed (no rollback).
fn inject_items(
    resource: &Arc<Resource>,
    items: Vec<Record>,
    options: &InjectOptions,
) -> Result<Vec<SharedRecord>> {
    let mut injected = Vec::with_capacity(items.len());
    for item in items {
        injected.push(inject_one(resource, item, options)?);
    }
    Ok(injected)
}

fn inject_one(
    resource: &Arc<Resource>,
    attrs: Record,
    options: &InjectOptions,
) -> Result<SharedRecord> {
    let def = &resource.definition;
    let id_value = attrs.get(&def.id_attribute).cloned().ok_or_else(|| {
        StoreError::runtime(format!(
            "attrs: must contain the identifying field `{}`",
            def.id_attribute
        ))
    })?;
    let id = RecordId::from_value(&id_value).ok_or_else(|| {
        StoreError::runtime(format!(
            "attrs: identifying field `{}` must be a string or a number",
            def.id_attribute
        ))
    })?;

    let mut state = resource.state.write();
    match state.index.get(&id).cloned() {
        None => {
            let record = SharedRecord::new(Record::new());
            record.write().merge(&attrs);
            state.index.insert(id.clone(), record.clone());
            state.collection.push(record.clone());
            state.commit(&id);
            tracing::debug!(resource = %def.name, %id, "injected new record");
            Ok(record)
        }
        Some(existing) => {
            // A cached record whose identifying field no longer matches its
            // index key was mutated out of band. Committing a merge on top
            // would corrupt the index, so the mutation is rejected.
            let current_id = existing
                .get(&def.id_attribute)
                .as_ref()
                .and_then(RecordId::from_value);
            if current_id.as_ref() != Some(&id) {
                tracing::warn!(
                    resource = %def.name,
                    %id,
                    "identifying field of a cached record was changed; rejecting mutation"
                );
                return Err(StoreError::runtime(format!(
                    "record {id} of resource {}: identifying field `{}` no longer matches \
                     its index key; mutations changing the identifying field are rejected",
                    def.name, def.id_attribute
                )));
            }

            match options.merge_strategy {
                MergeStrategy::MergeWithExisting => existing.write().merge(&attrs),
                MergeStrategy::Replace => existing.write().replace(&attrs),
            }
            state.commit(&id);
            tracing::debug!(resource = %def.name, %id, "merged into cached record");
            Ok(existing)
        }
    }
}
