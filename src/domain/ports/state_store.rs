//! DeploymentStateStore port
//!
//! Persists the deployment record (`deployment_data.yml`). Every mutating
//! operation is serialized by the implementation, so callers on different
//! threads share one store handle instead of locking themselves.

use std::path::{Path, PathBuf};

use crate::domain::entities::DeploymentState;

pub trait DeploymentStateStore: Send + Sync {
    /// Current record, or `default` when nothing is persisted
    fn get(&self, default: DeploymentState) -> Result<DeploymentState, StateError>;

    /// Shallow-merge `patch` into the record: each top-level key of the
    /// patch replaces the stored key of the same name.
    fn put(&self, patch: serde_yaml_ng::Mapping) -> Result<(), StateError>;

    fn add_source(&self, pod: &str, app: &str, path: &Path) -> Result<(), StateError>;

    /// Record a thin-client binary directory (under the `oneclient` key)
    fn add_oneclient_deployment(&self, pod_substring: &str, path: &Path)
        -> Result<(), StateError>;

    fn add_release(&self, name: &str) -> Result<(), StateError>;

    /// Forget releases that no longer exist in the cluster
    fn remove_releases(&self, names: &[String]) -> Result<(), StateError>;

    fn exists(&self) -> bool;

    /// Remove the persisted record
    fn clear(&self) -> Result<(), StateError>;

    /// Location shown to the user in errors
    fn location(&self) -> PathBuf;
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to access deployment data {}: {source}", .path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment data corrupted: {}\n  → Details: {message}", .path.display())]
    Corrupted { path: PathBuf, message: String },

    #[error("failed to serialize deployment data: {message}")]
    Serialization { message: String },
}
