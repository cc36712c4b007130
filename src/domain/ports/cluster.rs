//! ClusterApi port
//!
//! The subset of the cluster control plane the sync and watch engines use:
//! listing pods, running commands inside them and copying files out.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Lifecycle phase reported for a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// One pod as seen by the engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub phase: PodPhase,
    /// Every container reports ready
    pub ready: bool,
    /// `component` label (`onezone`, `oneprovider`, `oneclient`)
    pub component: Option<String>,
    /// `chart` label
    pub chart: Option<String>,
}

impl PodInfo {
    pub fn is_ready(&self) -> bool {
        self.phase == PodPhase::Running && self.ready
    }
}

pub trait ClusterApi: Send + Sync {
    fn list_pods(&self) -> Result<Vec<PodInfo>, ClusterError>;

    /// Single pod by exact name
    fn pod(&self, name: &str) -> Result<Option<PodInfo>, ClusterError> {
        Ok(self.list_pods()?.into_iter().find(|p| p.name == name))
    }

    /// Run `argv` in the pod's main container; returns stdout
    fn exec(&self, pod: &str, argv: &[&str]) -> Result<String, ClusterError>;

    fn file_exists(&self, pod: &str, path: &str) -> Result<bool, ClusterError>;

    /// Copy a file or directory out of the pod onto the host
    fn copy_from_pod(&self, pod: &str, pod_path: &str, host_path: &Path)
        -> Result<(), ClusterError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed in pod '{pod}': {command}\n{stderr}")]
    CommandFailed {
        pod: String,
        command: String,
        stderr: String,
    },

    #[error("unexpected cluster response: {message}")]
    InvalidResponse { message: String },
}
