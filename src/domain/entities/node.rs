//! Node entity - one cluster member and the applications it runs.

use std::path::{Path, PathBuf};

use super::application::Application;
use crate::domain::services::{patch_attributes, render_overlay_config};
use crate::domain::value_objects::NodeName;
use crate::error::{KubesrcError, KubesrcResult};

/// Root term of every generated runtime config
pub const CONFIG_ROOT: &str = "onepanel";

/// File name of the rendered overlay config
pub const OVERLAY_CONFIG_FILE: &str = "overlay.config";

/// File name of the panel's runtime config
pub const APP_CONFIG_FILE: &str = "app.config";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    node_name: NodeName,
    service: String,
    apps: Vec<Application>,
    /// `<deployment>/<service>/<node>`; holds this node's generated files
    rel_dir: PathBuf,
}

impl Node {
    pub fn new(
        node_name: NodeName,
        service: impl Into<String>,
        apps: Vec<Application>,
        deployment_dir: &Path,
    ) -> Self {
        let service = service.into();
        let rel_dir = deployment_dir.join(&service).join(node_name.to_string());
        Self {
            node_name,
            service,
            apps,
            rel_dir,
        }
    }

    pub fn node_name(&self) -> NodeName {
        self.node_name
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn apps(&self) -> &[Application] {
        &self.apps
    }

    pub fn rel_dir(&self) -> &Path {
        &self.rel_dir
    }

    pub fn overlay_config_path(&self) -> PathBuf {
        self.rel_dir.join(OVERLAY_CONFIG_FILE)
    }

    /// Local working copy of the panel config while it is being patched
    pub fn app_config_path(&self) -> PathBuf {
        self.rel_dir.join(APP_CONFIG_FILE)
    }

    /// The node's single panel application
    pub fn panel(&self) -> KubesrcResult<&Application> {
        let mut panels = self.apps.iter().filter(|a| a.is_panel());
        match (panels.next(), panels.count()) {
            (Some(panel), 0) => Ok(panel),
            (first, rest) => Err(KubesrcError::PanelCount {
                node: self.node_name.to_string(),
                count: usize::from(first.is_some()) + rest,
            }),
        }
    }

    pub fn render_overlay_config(&self) -> String {
        render_overlay_config(&self.apps)
    }

    /// Replace every application attribute found in `config` with this
    /// node's resolved value.
    pub fn patch_app_config(&self, config: &str) -> KubesrcResult<String> {
        self.panel()?;
        let pairs: Vec<(String, String)> = self
            .apps
            .iter()
            .flat_map(Application::keyed_attributes)
            .collect();
        Ok(patch_attributes(config, &pairs))
    }
}
