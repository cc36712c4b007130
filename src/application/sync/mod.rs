//! Sync Use Case
//!
//! Pushes host checkouts and client binaries into the pods recorded in the
//! deployment state, then patches the panel config and marks each pod ready.

mod engine;
mod pool;
mod report;

pub use engine::{
    service_of, SyncEngine, SyncSettings, CLIENT_BIN_PATH, SENTINEL_FILE, SYNCED_DIRS,
    TRANSFER_EXCLUDES,
};
pub use pool::{JobKey, WorkerPool};
pub use report::{PodOutcome, SyncReport};
