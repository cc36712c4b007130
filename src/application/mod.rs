//! Application Layer
//!
//! Use cases that orchestrate the business flow.
//! This layer:
//! - Depends on Domain layer (entities, services, ports)
//! - Does NOT contain business rules (those are in Domain)
//! - Coordinates between Infrastructure and Domain
//!
//! ## Use Cases
//!
//! - `ResolveUseCase` - Resolve a scenario, write values and overlay configs, record sources
//! - `DeployUseCase` - Resolve then install the release
//! - `SyncEngine` - Push host checkouts into pods on a keyed worker pool
//! - `WatchEngine` - Re-sync on filesystem changes
//! - `CleanUseCase` - Uninstall recorded releases and drop the state

pub mod clean;
pub mod deploy;
pub mod resolve;
pub mod sync;
pub mod watch;


pub use clean::{CleanResult, CleanUseCase};
pub use deploy::DeployUseCase;
pub use resolve::{ResolveOptions, ResolveResult, ResolveUseCase, SOURCES_VALUES_FILE};
pub use sync::{
    JobKey, PodOutcome, SyncEngine, SyncReport, SyncSettings, WorkerPool, CLIENT_BIN_PATH,
    SENTINEL_FILE, SYNCED_DIRS,
};
pub use watch::{WatchEngine, WatchEvent, WatchMessage, WatchSettings, WatchSummary, WatchTarget};
