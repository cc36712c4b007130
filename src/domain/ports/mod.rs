//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod cluster;
pub mod release_manager;
pub mod source_locator;
pub mod state_store;
pub mod transport;

pub use cluster::{ClusterApi, ClusterError, PodInfo, PodPhase};
pub use release_manager::ReleaseManager;
pub use source_locator::SourceLocator;
pub use state_store::{DeploymentStateStore, StateError};
pub use transport::{Transport, TransferError, TransferRequest};
