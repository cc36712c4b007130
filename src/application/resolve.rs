//! Resolve Use Case
//!
//! Reads a scenario and the user overrides, resolves the topology, writes the
//! rendered values and every node's overlay config into the deployment
//! directory, and records the sourced applications in the deployment state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::entities::{Scenario, UserOverrides};
use crate::domain::ports::{DeploymentStateStore, SourceLocator};
use crate::domain::services::{HostLayout, ResolvedTopology, TopologyResolver};
use crate::error::KubesrcResult;

/// Rendered Helm values, next to the deployment state
pub const SOURCES_VALUES_FILE: &str = "SourcesVal.yaml";

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub scenario: PathBuf,
    pub overrides: Option<PathBuf>,
    pub host: HostLayout,
    pub release: String,
    pub deployment_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub topology: ResolvedTopology,
    pub values_file: PathBuf,
    pub overlay_files: Vec<PathBuf>,
}

pub struct ResolveUseCase {
    locator: Arc<dyn SourceLocator>,
    store: Arc<dyn DeploymentStateStore>,
}

impl ResolveUseCase {
    pub fn new(locator: Arc<dyn SourceLocator>, store: Arc<dyn DeploymentStateStore>) -> Self {
        Self { locator, store }
    }

    pub fn execute(&self, options: &ResolveOptions) -> KubesrcResult<ResolveResult> {
        let scenario = Scenario::from_yaml(&options.scenario, &fs::read_to_string(&options.scenario)?)?;
        let overrides = match &options.overrides {
            Some(path) => UserOverrides::from_yaml(path, &fs::read_to_string(path)?)?,
            None => UserOverrides::default(),
        };

        let resolver = TopologyResolver::new(
            self.locator.as_ref(),
            &options.host,
            &options.release,
            &options.deployment_dir,
        );
        let topology = resolver.resolve(&scenario, &overrides)?;

        fs::create_dir_all(&options.deployment_dir)?;
        let values_file = write_values(&topology, &options.deployment_dir)?;

        let mut overlay_files = Vec::new();
        for node in topology.nodes() {
            fs::create_dir_all(node.rel_dir())?;
            let path = node.overlay_config_path();
            fs::write(&path, node.render_overlay_config())?;
            overlay_files.push(path);
        }

        for record in &topology.sources {
            self.store
                .add_source(&record.pod, record.app.as_str(), &record.path)?;
        }
        for client in &topology.clients {
            self.store
                .add_oneclient_deployment(&client.pod_substring, &client.path)?;
        }

        tracing::info!(
            scenario = %topology.scenario_key,
            services = topology.services.len(),
            sourced = topology.sources.len(),
            "topology resolved"
        );
        Ok(ResolveResult {
            topology,
            values_file,
            overlay_files,
        })
    }
}

fn write_values(topology: &ResolvedTopology, deployment_dir: &Path) -> KubesrcResult<PathBuf> {
    let path = deployment_dir.join(SOURCES_VALUES_FILE);
    let content = serde_yaml_ng::to_string(&topology.values_document()?)?;
    fs::write(&path, content)?;
    tracing::debug!(path = %path.display(), "wrote rendered values");
    Ok(path)
}
