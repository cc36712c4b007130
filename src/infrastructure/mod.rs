//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `cluster/` - kubectl cluster API and helm releases
//! - `fs/` - Source locator and deployments directory
//! - `repositories/` - Deployment state repository
//! - `sync/` - Host-to-pod transports

pub mod cluster;
pub mod fs;
pub mod repositories;
pub mod sync;

// Re-export for convenience
pub use cluster::{HelmReleases, KubectlCluster};
pub use fs::{DeploymentsDir, FsSourceLocator};
pub use repositories::YamlStateStore;
pub use sync::RsyncTransport;
