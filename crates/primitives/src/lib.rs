//! Primitives layer for lodestore
//!
//! Standalone building blocks with no dependency on the store itself.
//! Currently one primitive:
//! - BinaryHeap: array-backed min-heap over a pluggable weight function,
//!   used wherever ordered extraction is needed (bounded top-K views,
//!   eviction by recency).

#![warn(clippy::all)]

pub mod heap;

// Re-exports
pub use heap::BinaryHeap;
