//! Watch Use Case
//!
//! Keeps running pods in step with host checkouts:
//! - File system monitoring (via `notify` crate), one watcher per checkout
//!   subdirectory and per client binary directory
//! - Batching, so a burst of events becomes one resync per key
//! - Content hashing of client binaries to drop no-op rewrites
//! - Resyncs scheduled on the shared keyed worker pool

mod batch;
mod engine;
mod event;

pub use batch::{drain_batch, Batch, ClientFilter, WatchMessage};
pub use engine::{WatchEngine, WatchSummary, WatchTarget};
pub use event::{WatchEvent, WatchSettings};
