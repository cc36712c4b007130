//! Clean Use Case
//!
//! Uninstalls every release a deployment recorded and removes its state.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::DeploymentState;
use crate::domain::ports::{DeploymentStateStore, ReleaseManager};
use crate::error::KubesrcResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanResult {
    pub uninstalled: Vec<String>,
    /// `(release, error)`; only these stay recorded for a retry
    pub failed: Vec<(String, String)>,
    pub state_removed: bool,
}

impl CleanResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct CleanUseCase {
    releases: Arc<dyn ReleaseManager>,
    store: Arc<dyn DeploymentStateStore>,
}

impl CleanUseCase {
    pub fn new(releases: Arc<dyn ReleaseManager>, store: Arc<dyn DeploymentStateStore>) -> Self {
        Self { releases, store }
    }

    pub fn execute(&self) -> KubesrcResult<CleanResult> {
        let mut result = CleanResult::default();
        if !self.store.exists() {
            return Ok(result);
        }

        let state = self.store.get(DeploymentState::default())?;
        for release in &state.releases {
            match self.releases.uninstall(release) {
                Ok(()) => {
                    tracing::info!(release = %release, "release uninstalled");
                    result.uninstalled.push(release.clone());
                }
                Err(e) => {
                    tracing::warn!(release = %release, error = %e, "uninstall failed");
                    result.failed.push((release.clone(), e.to_string()));
                }
            }
        }

        if result.is_success() {
            self.store.clear()?;
            result.state_removed = true;
        } else if !result.uninstalled.is_empty() {
            self.store.remove_releases(&result.uninstalled)?;
        }
        Ok(result)
    }
}
