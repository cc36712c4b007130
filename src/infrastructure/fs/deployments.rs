//! Deployments directory
//!
//! Every deployment gets a timestamped directory under
//! `~/.kubesrc/deployments`; the newest one is the current deployment.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{KubesrcError, KubesrcResult};

const TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";
pub const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone)]
pub struct DeploymentsDir {
    root: PathBuf,
}

impl DeploymentsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory for a deployment started at `now`
    pub fn create(&self, now: DateTime<Local>) -> KubesrcResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let name = now.format(TIMESTAMP_FORMAT).to_string();

        let mut path = self.root.join(&name);
        let mut suffix = 1;
        while path.exists() {
            path = self.root.join(format!("{name}#{suffix}"));
            suffix += 1;
        }
        fs::create_dir_all(path.join(LOGS_DIR))?;
        tracing::debug!(path = %path.display(), "created deployment directory");
        Ok(path)
    }

    fn entries(&self) -> KubesrcResult<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort_by_cached_key(|p| sort_key(p));
        Ok(entries)
    }

    /// The newest deployment
    pub fn current(&self) -> KubesrcResult<PathBuf> {
        self.entries()?
            .pop()
            .ok_or_else(|| KubesrcError::NoDeployments {
                dir: self.root.clone(),
            })
    }

    /// Keep the newest `keep` deployments (at least one); returns the
    /// removed ones
    pub fn prune(&self, keep: usize) -> KubesrcResult<Vec<PathBuf>> {
        let entries = self.entries()?;
        let excess = entries.len().saturating_sub(keep.max(1));
        let removed: Vec<PathBuf> = entries.into_iter().take(excess).collect();
        for dir in &removed {
            tracing::warn!(path = %dir.display(), "removing old deployment data");
            fs::remove_dir_all(dir)?;
        }
        Ok(removed)
    }
}

/// `(timestamp, collision suffix)`, so `#10` sorts after `#2`
fn sort_key(path: &Path) -> (String, u64) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('#') {
        Some((stamp, suffix)) => match suffix.parse() {
            Ok(n) => (stamp.to_string(), n),
            Err(_) => (name, 0),
        },
        None => (name, 0),
    }
}

pub fn logs_dir(deployment_dir: &Path) -> PathBuf {
    deployment_dir.join(LOGS_DIR)
}
