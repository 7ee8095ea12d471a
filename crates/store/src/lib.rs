//! Store layer for lodestore
//!
//! This crate owns the shared mutable state every other layer works against:
//! - ResourceDefinition and the resource registry
//! - Per-resource tables (index, collection, snapshots, change log,
//!   timestamps, fetch markers)
//! - The injector: merge-and-diff with scheduler gating
//! - The query engine: synchronous predicate/ordering/pagination over the
//!   cached collection
//!
//! Fetching is layered on top in `lodestore-fetch`; this crate only holds the
//! pending/completed fetch tables it coordinates through.

#![warn(clippy::all)]

pub mod definition;
pub mod inject;
pub mod query;
pub mod registry;
pub mod resource;
pub mod scheduler;

// Re-exports
pub use definition::ResourceDefinition;
pub use inject::{Injected, InjectOptions, MergeStrategy};
pub use registry::ResourceRegistry;
pub use resource::{FetchFuture, FetchStamp, Resource, ResourceState};
pub use scheduler::{ImmediateScheduler, UpdateScheduler};
