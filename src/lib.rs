//! kubesrc - run multi-service cluster deployments from host source trees
//!
//! kubesrc reads a scenario (Helm values), decides per node and application
//! whether the application runs from the packaged image or from a host
//! checkout, installs the release, and keeps the running pods in step with
//! the host checkouts.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    CleanUseCase, DeployUseCase, ResolveOptions, ResolveUseCase, SyncEngine, SyncReport,
    SyncSettings, WatchEngine, WatchEvent, WatchSettings,
};
pub use config::Config;
pub use domain::entities::{DeploymentState, Scenario, UserOverrides};
pub use domain::value_objects::{AppName, NodeName, ServiceRole};
pub use error::{KubesrcError, KubesrcResult};
