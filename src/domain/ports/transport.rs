//! Transport port
//!
//! Copies a host directory into a pod. Implementations tunnel the copy
//! through an in-pod exec channel; every invocation blocks its caller.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest<'a> {
    pub pod: &'a str,
    /// Directory on the host; its contents are copied
    pub host_path: &'a Path,
    /// Destination directory in the pod
    pub pod_dir: &'a str,
    /// Patterns excluded from the copy
    pub excludes: &'a [&'a str],
    /// File the command output is appended to
    pub log_file: &'a Path,
}

pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    fn push(&self, request: &TransferRequest<'_>) -> Result<(), TransferError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status} (see {})", .log_file.display())]
    Failed {
        program: String,
        status: String,
        log_file: PathBuf,
    },

    #[error("cannot write transfer log {}: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
