//! Deployment state entity - the record persisted in `deployment_data.yml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::AppName;

/// App key used for thin-client entries
pub const CLIENT_APP_KEY: &str = "oneclient";

/// `pod -> app -> host path`
pub type SourceMap = BTreeMap<String, BTreeMap<String, PathBuf>>;

/// Everything a running deployment remembers about itself.
///
/// Keys other than the three known ones are kept in `extra` so that
/// shallow `put` merges of arbitrary keys survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Stateful-set pod → app → host checkout
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: SourceMap,

    /// Client pod substring → app → host binary directory
    #[serde(default, rename = "oc-deployments", skip_serializing_if = "BTreeMap::is_empty")]
    pub oc_deployments: SourceMap,

    /// Releases created by this deployment, for teardown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

impl DeploymentState {
    pub fn insert_source(&mut self, pod: &str, app: &str, path: &Path) {
        self.sources
            .entry(pod.to_string())
            .or_default()
            .insert(app.to_string(), path.to_path_buf());
    }

    pub fn insert_client_deployment(&mut self, pod_substring: &str, path: &Path) {
        self.oc_deployments
            .entry(pod_substring.to_string())
            .or_default()
            .insert(CLIENT_APP_KEY.to_string(), path.to_path_buf());
    }

    pub fn insert_release(&mut self, name: &str) {
        if !self.releases.iter().any(|r| r == name) {
            self.releases.push(name.to_string());
        }
    }

    /// Sourced applications of a pod. Unknown app names are skipped.
    pub fn pod_sources(&self, pod: &str) -> Vec<(AppName, PathBuf)> {
        self.sources
            .get(pod)
            .into_iter()
            .flatten()
            .filter_map(|(app, path)| match app.parse::<AppName>() {
                Ok(name) => Some((name, path.clone())),
                Err(e) => {
                    tracing::warn!(pod = %pod, error = %e, "ignoring unknown application in deployment data");
                    None
                }
            })
            .collect()
    }

    pub fn source_path(&self, pod: &str, app: AppName) -> Option<&Path> {
        self.sources
            .get(pod)
            .and_then(|apps| apps.get(app.as_str()))
            .map(PathBuf::as_path)
    }
}
