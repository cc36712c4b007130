//! Error types for kubesrc
//!
//! Library code returns [`KubesrcError`]; the binary wraps it in `anyhow`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::ports::{ClusterError, StateError, TransferError};

/// Result type alias for kubesrc operations
pub type KubesrcResult<T> = Result<T, KubesrcError>;

/// Main error type for kubesrc operations
#[derive(Error, Debug)]
pub enum KubesrcError {
    /// An application declared as sourced could not be found on the host
    #[error("cannot locate sources for {app}, tried:\n{}", format_tried(.tried))]
    Locate { app: String, tried: Vec<PathBuf> },

    /// Pod did not report a running, ready container within the bound
    #[error("timeout after {}s while waiting for pod '{pod}' to be running", .timeout.as_secs())]
    ReadinessTimeout { pod: String, timeout: Duration },

    /// An underlying copy or exec command failed
    #[error("transfer failed for pod '{pod}': {message} (see {})", .log_file.display())]
    TransferFailed {
        pod: String,
        message: String,
        log_file: PathBuf,
    },

    /// Sync or watch started while no deployment state exists
    #[error("deployment data not found at {}. Is this deployment running from sources?", .path.display())]
    MissingState { path: PathBuf },

    /// Node name does not follow `node-N` (N >= 1) or `nK`
    #[error("invalid node name '{name}': {reason}")]
    InvalidNodeName { name: String, reason: String },

    /// A node must own exactly one panel application
    #[error("node '{node}' has {count} panel applications, expected exactly one")]
    PanelCount { node: String, count: usize },

    /// Scenario or override document is malformed
    #[error("invalid scenario {}: {message}", .path.display())]
    Scenario { path: PathBuf, message: String },

    /// User configuration could not be parsed
    #[error("invalid configuration in {}: {message}", .file.display())]
    Config { file: PathBuf, message: String },

    /// A pod pattern selected none of the deployment's pods
    #[error("there are no pods matching '{pattern}'")]
    NoMatchingPods { pattern: String },

    /// No deployment directory exists yet
    #[error("there are no deployments in {}", .dir.display())]
    NoDeployments { dir: PathBuf },

    /// Deployment state store failure
    #[error(transparent)]
    State(#[from] StateError),

    /// Cluster API failure
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Transport failure outside of a pod job
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Filesystem watch backend failure
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

fn format_tried(tried: &[PathBuf]) -> String {
    tried
        .iter()
        .map(|p| format!("    {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_error_lists_every_path() {
        let err = KubesrcError::Locate {
            app: "oz-worker".to_string(),
            tried: vec![PathBuf::from("/w/oz-worker"), PathBuf::from("/w/../oz_worker")],
        };
        assert_eq!(
            err.to_string(),
            "cannot locate sources for oz-worker, tried:\n    /w/oz-worker\n    /w/../oz_worker"
        );
    }

    #[test]
    fn readiness_timeout_display() {
        let err = KubesrcError::ReadinessTimeout {
            pod: "dev-onezone-0".to_string(),
            timeout: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "timeout after 300s while waiting for pod 'dev-onezone-0' to be running"
        );
    }

    #[test]
    fn missing_state_asks_about_sources() {
        let err = KubesrcError::MissingState {
            path: PathBuf::from("/d/deployment_data.yml"),
        };
        assert!(err.to_string().contains("Is this deployment running from sources?"));
    }
}
