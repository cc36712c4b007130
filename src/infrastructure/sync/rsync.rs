//! Rsync Transport
//!
//! Copies host directories into pods with rsync tunnelled through
//! `kubectl exec`: the remote shell is `kubectl exec <pod> -i --` and the
//! pod-side destination is passed as the rsync path.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::domain::ports::{TransferError, TransferRequest, Transport};

pub struct RsyncTransport {
    namespace: String,
}

impl RsyncTransport {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Check if rsync is installed and available
    pub fn check_available() -> bool {
        Command::new("rsync")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn rsh(&self, pod: &str) -> String {
        if self.namespace.is_empty() {
            format!("kubectl exec {pod} -i -- ")
        } else {
            format!("kubectl --namespace {} exec {pod} -i -- ", self.namespace)
        }
    }

    pub fn args(&self, request: &TransferRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "--archive".to_string(),
            "--blocking-io".to_string(),
            format!("--rsync-path={}", request.pod_dir),
            format!("--rsh={}", self.rsh(request.pod)),
        ];
        args.extend(request.excludes.iter().map(|e| format!("--exclude={e}")));
        args.push(request.host_path.display().to_string());
        args.push("rsync:.".to_string());
        args
    }
}

fn open_log(path: &Path) -> Result<File, TransferError> {
    let log_error = |source| TransferError::Log {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(log_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_error)
}

impl Transport for RsyncTransport {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn push(&self, request: &TransferRequest<'_>) -> Result<(), TransferError> {
        let log = open_log(request.log_file)?;
        let stderr = log.try_clone().map_err(|source| TransferError::Log {
            path: request.log_file.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            pod = %request.pod,
            from = %request.host_path.display(),
            to = %request.pod_dir,
            "rsync"
        );
        let status = Command::new("rsync")
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|source| TransferError::Spawn {
                program: "rsync".to_string(),
                source,
            })?;

        if !status.success() {
            return Err(TransferError::Failed {
                program: "rsync".to_string(),
                status: status.to_string(),
                log_file: request.log_file.to_path_buf(),
            });
        }
        Ok(())
    }
}
