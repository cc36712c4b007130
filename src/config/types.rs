//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User configuration (`~/.kubesrc/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: HostConfig,
    pub cluster: ClusterConfig,
    pub sync: SyncConfig,
    pub watch: WatchConfig,
    pub deployments: DeploymentsConfig,
}

/// Host directories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Operator home directory; defaults to the current user's home
    pub home_dir: Option<PathBuf>,
    /// Home directory as mounted into the cluster VM; defaults to `home_dir`
    pub kube_home_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub namespace: String,
    pub release_name: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            release_name: "dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent sync jobs
    pub workers: usize,
    pub readiness_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            readiness_timeout_secs: 300,
            poll_interval_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Queued events drained per dispatch
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    /// Sync every watched key once on start
    pub initial_sync: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            poll_interval_ms: 50,
            initial_sync: true,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentsConfig {
    /// Defaults to `~/.kubesrc/deployments`
    pub dir: Option<PathBuf>,
    pub max_history: usize,
}

impl Default for DeploymentsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_history: 10,
        }
    }
}

impl Config {
    pub fn home_dir(&self) -> PathBuf {
        self.host
            .home_dir
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    pub fn kube_home_dir(&self) -> PathBuf {
        self.host
            .kube_home_dir
            .clone()
            .unwrap_or_else(|| self.home_dir())
    }

    pub fn deployments_dir(&self) -> PathBuf {
        self.deployments
            .dir
            .clone()
            .unwrap_or_else(|| super::loader::kubesrc_dir().join("deployments"))
    }
}
