//! Record types
//!
//! A record is a JSON object belonging to a named resource. Records are held
//! behind `SharedRecord` so the per-resource index and collection share one
//! identity-stable allocation: updates merge into the existing record in
//! place, and long-lived external references observe them.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// The field map backing a record.
pub type Fields = serde_json::Map<String, Value>;

/// Human-readable JSON type name, used in `IllegalArgument` details.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// RecordId
// ============================================================================

/// The value of a record's identifying field.
///
/// Identifying values are strings or integers; anything else in the
/// identifying slot is a contract violation at injection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl RecordId {
    /// Extract an id from a JSON value, if it is a string or an integer.
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    /// The id as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        RecordId::Int(n as i64)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Str(s)
    }
}

// ============================================================================
// Record
// ============================================================================

/// A single cached object: a JSON field map.
///
/// Newtype over `serde_json::Map` with `Deref` access to the underlying map,
/// plus the shallow-merge used by injection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Fields);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Record(Fields::new())
    }

    /// Create a record from an existing field map.
    pub fn from_fields(fields: Fields) -> Self {
        Record(fields)
    }

    /// The record as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Shallow-merge `attrs` into this record.
    ///
    /// Top-level fields are added or overwritten; nested values are replaced
    /// wholesale, never merged.
    pub fn merge(&mut self, attrs: &Fields) {
        for (key, value) in attrs {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Replace every field with `attrs`, keeping nothing of the old state.
    pub fn replace(&mut self, attrs: &Fields) {
        self.0 = attrs.clone();
    }
}

impl Deref for Record {
    type Target = Fields;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Fields> for Record {
    fn from(fields: Fields) -> Self {
        Record(fields)
    }
}

// ============================================================================
// SharedRecord
// ============================================================================

/// Identity-stable handle to a record.
///
/// The index and the insertion-ordered collection hold clones of the same
/// handle, so an in-place update is visible through every copy. `PartialEq`
/// compares field contents; use [`SharedRecord::ptr_eq`] for identity.
#[derive(Debug, Clone)]
pub struct SharedRecord(Arc<RwLock<Record>>);

impl SharedRecord {
    /// Wrap a record in a shared handle.
    pub fn new(record: Record) -> Self {
        SharedRecord(Arc::new(RwLock::new(record)))
    }

    /// Read access to the record.
    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read()
    }

    /// Write access to the record.
    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write()
    }

    /// A detached copy of the current field state.
    pub fn snapshot(&self) -> Record {
        self.0.read().clone()
    }

    /// Clone of a single field's value, if present.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.read().get(field).cloned()
    }

    /// True when both handles refer to the same allocation.
    pub fn ptr_eq(&self, other: &SharedRecord) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SharedRecord {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.0.read() == *other.0.read()
    }
}
