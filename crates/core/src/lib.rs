//! Core types for lodestore
//!
//! This crate defines the vocabulary shared by every layer:
//! - StoreError: the closed three-kind error taxonomy
//! - Record / RecordId / SharedRecord: JSON-object records with stable identity
//! - Diff: field-level change sets between record snapshots
//! - Timestamp helpers with explicit monotonic tie-breaking

#![warn(clippy::all)]

pub mod diff;
pub mod error;
pub mod record;
pub mod time;

// Re-exports
pub use diff::Diff;
pub use error::{Result, StoreError};
pub use record::{value_type_name, Fields, Record, RecordId, SharedRecord};
pub use time::{now_millis, update_timestamp};
