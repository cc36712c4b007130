//! ReleaseManager port
//!
//! Installs and removes versioned releases of the deployment charts.

use std::path::Path;

use super::cluster::ClusterError;

pub trait ReleaseManager: Send + Sync {
    fn install(&self, release: &str, chart: &str, values_files: &[&Path]) -> Result<(), ClusterError>;

    fn uninstall(&self, release: &str) -> Result<(), ClusterError>;
}
