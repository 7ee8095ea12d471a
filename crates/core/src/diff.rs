//! Field-level diffs between record snapshots
//!
//! Every committed injection compares the record's current fields against the
//! last committed snapshot and stores the resulting `Diff` in the resource's
//! change log. Diffing is deterministic and independent of any host
//! reactivity system.

use crate::record::Record;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The set of added, removed and changed fields between two snapshots.
///
/// `added` and `changed` hold the new values; `removed` holds the old ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    /// Fields present now but not in the previous snapshot.
    pub added: BTreeMap<String, Value>,
    /// Fields present in the previous snapshot but gone now.
    pub removed: BTreeMap<String, Value>,
    /// Fields present in both with different values.
    pub changed: BTreeMap<String, Value>,
}

impl Diff {
    /// Compute the diff from `previous` to `current`.
    pub fn between(previous: &Record, current: &Record) -> Diff {
        let mut diff = Diff::default();

        for (key, value) in current.iter() {
            match previous.get(key) {
                None => {
                    diff.added.insert(key.clone(), value.clone());
                }
                Some(old) if old != value => {
                    diff.changed.insert(key.clone(), value.clone());
                }
                Some(_) => {}
            }
        }

        for (key, value) in previous.iter() {
            if !current.contains_key(key) {
                diff.removed.insert(key.clone(), value.clone());
            }
        }

        diff
    }

    /// True when nothing was added, removed or changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// True when `field` appears in any of the three sets.
    pub fn touches(&self, field: &str) -> bool {
        self.added.contains_key(field)
            || self.removed.contains_key(field)
            || self.changed.contains_key(field)
    }
}
