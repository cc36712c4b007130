//! Deploy Use Case
//!
//! Resolves the topology and installs the release with the scenario and the
//! rendered values. Pod syncing is a separate step driven by the caller.

use std::path::Path;
use std::sync::Arc;

use super::resolve::{ResolveOptions, ResolveResult, ResolveUseCase};
use crate::domain::ports::{DeploymentStateStore, ReleaseManager};
use crate::error::KubesrcResult;

pub struct DeployUseCase {
    resolve: ResolveUseCase,
    releases: Arc<dyn ReleaseManager>,
    store: Arc<dyn DeploymentStateStore>,
}

impl DeployUseCase {
    pub fn new(
        resolve: ResolveUseCase,
        releases: Arc<dyn ReleaseManager>,
        store: Arc<dyn DeploymentStateStore>,
    ) -> Self {
        Self {
            resolve,
            releases,
            store,
        }
    }

    pub fn execute(&self, options: &ResolveOptions, chart: &str) -> KubesrcResult<ResolveResult> {
        let resolved = self.resolve.execute(options)?;

        // Later files win, so the rendered values come last.
        let values: [&Path; 2] = [&options.scenario, &resolved.values_file];
        self.releases.install(&options.release, chart, &values)?;
        self.store.add_release(&options.release)?;

        tracing::info!(release = %options.release, chart = %chart, "release installed");
        Ok(resolved)
    }
}
