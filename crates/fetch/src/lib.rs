//! Fetch layer for lodestore
//!
//! Orchestrates `find`: cache lookup against the store's completed-fetch
//! markers, in-flight de-duplication through shared futures, delegation to a
//! named transport adapter, and injection of raw results. The coordinator is
//! transport-agnostic; adapters own HTTP/storage I/O and timeouts.

#![warn(clippy::all)]

pub mod adapter;
pub mod coordinator;

// Re-exports
pub use adapter::{Adapter, FindOptions};
pub use coordinator::FetchCoordinator;
