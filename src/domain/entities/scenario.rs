//! Scenario and user-override documents.
//!
//! A scenario is a Helm values document keyed by one scenario name. Only the
//! parts the resolver reads are typed; every other key is carried through
//! `extra` untouched so the rendered values stay a superset of the input.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};

use crate::domain::value_objects::{service_alias, AppName, NodeName};
use crate::error::{KubesrcError, KubesrcResult};

/// Node cluster-membership groups, `group -> [node]`
pub type ClusterConfig = BTreeMap<String, Vec<NodeName>>;

/// One application listed for a node in `deployFromSources`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: AppName,
    #[serde(rename = "hostPath", default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
}

impl SourceEntry {
    pub fn named(name: AppName) -> Self {
        Self { name, host_path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSources {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl NodeSources {
    pub fn lists(&self, app: AppName) -> bool {
        self.sources.iter().any(|s| s.name == app)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployFromSources {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<NodeName, NodeSources>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Helm values of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceValues {
    #[serde(default)]
    pub deploy_from_sources: DeployFromSources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_dir: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// A parsed scenario values file
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub key: String,
    pub services: BTreeMap<String, ServiceValues>,
}

impl Scenario {
    /// Parse a scenario document. The scenario key is the first top-level
    /// key of the form `onedata-<N>p`, or the first key if none matches.
    pub fn from_yaml(path: &Path, text: &str) -> KubesrcResult<Self> {
        let doc: Mapping = serde_yaml_ng::from_str(text).map_err(|e| scenario_error(path, e))?;

        let keys: Vec<&str> = doc.keys().filter_map(Value::as_str).collect();
        let key = keys
            .iter()
            .find(|k| is_scenario_key(k))
            .or_else(|| keys.first())
            .map(|k| k.to_string())
            .ok_or_else(|| KubesrcError::Scenario {
                path: path.to_path_buf(),
                message: "document has no scenario key".to_string(),
            })?;

        let body = doc.get(key.as_str()).cloned().unwrap_or(Value::Null);
        let services = match body {
            Value::Null => BTreeMap::new(),
            other => serde_yaml_ng::from_value(other).map_err(|e| scenario_error(path, e))?,
        };
        Ok(Self { key, services })
    }
}

fn is_scenario_key(key: &str) -> bool {
    key.strip_prefix("onedata-")
        .and_then(|rest| rest.strip_suffix('p'))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn scenario_error(path: &Path, e: serde_yaml_ng::Error) -> KubesrcError {
    KubesrcError::Scenario {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// The `sources` key of the user overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SourcesOverride {
    /// `sources: true` enables sources mode everywhere
    All(bool),
    /// `sources: {service: ...}` enables it per service
    PerService(BTreeMap<String, ServiceSources>),
}

impl SourcesOverride {
    /// Per-service entry for `service`, under its own name or its alias
    pub fn service(&self, service: &str) -> Option<&ServiceSources> {
        match self {
            SourcesOverride::All(_) => None,
            SourcesOverride::PerService(services) => services
                .get(service)
                .or_else(|| service_alias(service).and_then(|alias| services.get(alias))),
        }
    }
}

impl Default for SourcesOverride {
    fn default() -> Self {
        SourcesOverride::All(false)
    }
}

/// Per-service entry under `sources`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServiceSources {
    /// `node-N: [app, ...]`
    Nodes(BTreeMap<String, Vec<AppName>>),
    /// Thin clients take a build type instead (`release`, `debug`)
    Build(String),
    Enabled(bool),
}

/// Per-service override block (keyed by the service name)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverride {
    /// `group -> [node-N, ...]`
    #[serde(default)]
    pub cluster_config: Option<BTreeMap<String, Vec<String>>>,
    /// Helm values merged over the scenario's values for the service
    #[serde(flatten)]
    pub values: Mapping,
}

/// User overrides applied on top of a scenario
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserOverrides {
    #[serde(default)]
    pub sources: SourcesOverride,
    /// Every other top-level key; service blocks are read from here lazily
    #[serde(flatten)]
    pub rest: Mapping,
}

impl UserOverrides {
    pub fn from_yaml(path: &Path, text: &str) -> KubesrcResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|e| scenario_error(path, e))
    }

    /// Override block for `service`, if the overrides name it
    pub fn service(&self, service: &str) -> KubesrcResult<Option<ServiceOverride>> {
        let entry = self
            .rest
            .get(service)
            .or_else(|| service_alias(service).and_then(|alias| self.rest.get(alias)));
        match entry {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_yaml_ng::from_value(value.clone())
                .map(Some)
                .map_err(KubesrcError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
onedata-1p:
  onezone:
    image: onedata/onezone:develop
    deployFromSources:
      enabled: false
      nodes:
        n0:
          sources:
            - name: oz-worker
            - name: oz-panel
  oneprovider-krakow:
    deployFromSources:
      enabled: false
  oneclient:
    deployFromSources:
      enabled: false
      type: release
"#;

    #[test]
    fn scenario_key_prefers_onedata_pattern() {
        let text = "global:\n  x: 1\nonedata-2p:\n  onezone: {}\n";
        let scenario = Scenario::from_yaml(Path::new("s.yaml"), text).unwrap();
        assert_eq!(scenario.key, "onedata-2p");
        assert!(scenario.services.contains_key("onezone"));
    }

    #[test]
    fn scenario_keeps_untyped_values() {
        let scenario = Scenario::from_yaml(Path::new("s.yaml"), SCENARIO).unwrap();
        let zone = &scenario.services["onezone"];
        assert_eq!(
            zone.extra.get("image").and_then(Value::as_str),
            Some("onedata/onezone:develop")
        );
        let n0 = &zone.deploy_from_sources.nodes[&NodeName::BASELINE];
        assert!(n0.lists(AppName::OzWorker));
        assert!(!n0.lists(AppName::ClusterManager));

        let client = &scenario.services["oneclient"];
        assert_eq!(
            client.deploy_from_sources.extra.get("type").and_then(Value::as_str),
            Some("release")
        );
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(Scenario::from_yaml(Path::new("s.yaml"), "{}").is_err());
    }

    #[test]
    fn overrides_accept_bool_and_map() {
        let all = UserOverrides::from_yaml(Path::new("o"), "sources: true").unwrap();
        assert_eq!(all.sources, SourcesOverride::All(true));

        let text = "sources:\n  onezone:\n    node-1: [oz-worker]\n  oneclient: release\n";
        let per = UserOverrides::from_yaml(Path::new("o"), text).unwrap();
        let SourcesOverride::PerService(map) = per.sources else {
            panic!("expected per-service sources");
        };
        assert!(matches!(map["onezone"], ServiceSources::Nodes(_)));
        assert_eq!(map["oneclient"], ServiceSources::Build("release".to_string()));
    }

    #[test]
    fn service_override_reads_cluster_config() {
        let text = "onezone:\n  clusterConfig:\n    managers: [node-1, node-2]\n  image: custom\n";
        let overrides = UserOverrides::from_yaml(Path::new("o"), text).unwrap();
        let zone = overrides.service("onezone").unwrap().unwrap();
        assert_eq!(zone.cluster_config.unwrap()["managers"].len(), 2);
        assert!(zone.values.contains_key("image"));
        assert!(overrides.service("oneprovider").unwrap().is_none());
    }
}
