//! Service entity - one running instance of a role family.

use std::path::{Component, Path, PathBuf};

use serde_yaml_ng::Value;

use super::node::Node;
use super::scenario::{ClusterConfig, NodeSources, ServiceValues, SourceEntry};
use crate::domain::value_objects::{NodeName, ServiceRole};

/// Where the service's host paths are mounted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixes {
    pub host_path_prefix: String,
    pub vm_path_prefix: String,
    pub deployment_dir: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    name: String,
    role: ServiceRole,
    prefixes: PathPrefixes,
    /// Set once any sourced path lies outside the host home directory
    override_prefix: bool,
    nodes: Vec<Node>,
    node_sources: Vec<(NodeName, NodeSources)>,
    cluster_config: ClusterConfig,
    values: ServiceValues,
}

impl Service {
    pub fn new(name: impl Into<String>, prefixes: PathPrefixes, values: ServiceValues) -> Self {
        let name = name.into();
        Self {
            role: ServiceRole::from_service_name(&name),
            name,
            prefixes,
            override_prefix: false,
            nodes: Vec::new(),
            node_sources: Vec::new(),
            cluster_config: ClusterConfig::new(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    pub fn prefixes(&self) -> &PathPrefixes {
        &self.prefixes
    }

    pub fn override_prefix(&self) -> bool {
        self.override_prefix
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: NodeName) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_name() == name)
    }

    pub fn values(&self) -> &ServiceValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ServiceValues {
        &mut self.values
    }

    pub fn set_cluster_config(&mut self, config: ClusterConfig) {
        self.cluster_config = config;
    }

    /// Add a resolved node together with its serialisable source list
    pub fn push_node(&mut self, node: Node, sources: Vec<SourceEntry>) {
        self.node_sources
            .push((node.node_name(), NodeSources { sources }));
        self.nodes.push(node);
    }

    /// Switch the whole service to pod-absolute paths.
    ///
    /// The mount prefixes become empty and the deployment directory becomes
    /// relative to `/`, so charts joining `prefix + "/" + path` get the
    /// absolute host path.
    /// Sourced entries of every node are rewritten to their absolute
    /// location, including those that lie inside the home directory.
    pub fn apply_override_prefix(&mut self, deployment_dir: &Path) {
        self.override_prefix = true;
        self.prefixes.host_path_prefix.clear();
        self.prefixes.vm_path_prefix.clear();
        self.prefixes.deployment_dir = relative_to_root(deployment_dir);

        for (node, (_, sources)) in self.nodes.iter().zip(self.node_sources.iter_mut()) {
            for entry in &mut sources.sources {
                let location = node
                    .apps()
                    .iter()
                    .find(|app| app.name() == entry.name)
                    .and_then(|app| app.source_path());
                if let Some(location) = location {
                    entry.host_path = Some(location.display().to_string());
                }
            }
        }
    }

    /// Helm values with resolved nodes, prefixes and counts filled in
    pub fn rendered_values(&self) -> ServiceValues {
        let mut values = self.values.clone();
        values.host_path_prefix = Some(self.prefixes.host_path_prefix.clone());
        values.vm_path_prefix = Some(self.prefixes.vm_path_prefix.clone());
        values.deployment_dir = Some(self.prefixes.deployment_dir.clone());
        if self.role != ServiceRole::Client {
            values.deploy_from_sources.nodes = self.node_sources.iter().cloned().collect();

            let count = self.nodes.len().max(1) as u64;
            values
                .extra
                .insert(Value::from(self.role.nodes_count_key()), Value::from(count));
        }
        if !self.cluster_config.is_empty() {
            let mut groups = serde_yaml_ng::Mapping::new();
            for (group, nodes) in &self.cluster_config {
                let ordinals = nodes.iter().map(|n| Value::from(n.ordinal() as u64)).collect();
                groups.insert(Value::from(group.as_str()), Value::Sequence(ordinals));
            }
            values
                .extra
                .insert(Value::from("cluster_config"), Value::Mapping(groups));
        }
        values
    }
}

/// `/home/u/deployments/x` → `home/u/deployments/x`
pub fn relative_to_root(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect::<PathBuf>()
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> PathPrefixes {
        PathPrefixes {
            host_path_prefix: "/home/u".to_string(),
            vm_path_prefix: "/hosthome".to_string(),
            deployment_dir: ".kubesrc/deployments/d".to_string(),
        }
    }

    #[test]
    fn override_empties_prefixes_service_wide() {
        let mut svc = Service::new("onezone", prefixes(), ServiceValues::default());
        svc.apply_override_prefix(Path::new("/home/u/.kubesrc/deployments/d"));
        assert!(svc.override_prefix());
        assert_eq!(svc.prefixes().host_path_prefix, "");
        assert_eq!(svc.prefixes().vm_path_prefix, "");
        assert_eq!(svc.prefixes().deployment_dir, "home/u/.kubesrc/deployments/d");
    }

    #[test]
    fn override_rewrites_home_relative_entries_to_absolute() {
        use crate::domain::entities::Application;
        use crate::domain::value_objects::AppName;

        let mut svc = Service::new("onezone", prefixes(), ServiceValues::default());
        let node = Node::new(
            NodeName::BASELINE,
            "onezone",
            vec![
                Application::sourced(AppName::OzPanel, "/home/u/onepanel"),
                Application::packaged(AppName::ClusterManager),
                Application::sourced(AppName::OzWorker, "/opt/build/oz-worker"),
            ],
            Path::new("/home/u/.kubesrc/deployments/d"),
        );
        svc.push_node(
            node,
            vec![
                SourceEntry {
                    name: AppName::OzPanel,
                    host_path: Some("onepanel".to_string()),
                },
                SourceEntry {
                    name: AppName::ClusterManager,
                    host_path: Some(String::new()),
                },
                SourceEntry {
                    name: AppName::OzWorker,
                    host_path: Some("/opt/build/oz-worker".to_string()),
                },
            ],
        );
        svc.apply_override_prefix(Path::new("/home/u/.kubesrc/deployments/d"));

        let values = svc.rendered_values();
        let sources = &values.deploy_from_sources.nodes[&NodeName::BASELINE].sources;
        let paths: Vec<_> = sources.iter().map(|s| s.host_path.as_deref()).collect();
        assert_eq!(
            paths,
            vec![Some("/home/u/onepanel"), Some(""), Some("/opt/build/oz-worker")]
        );
    }

    #[test]
    fn rendered_values_carry_node_count_and_cluster_config() {
        let mut svc = Service::new("oneprovider-krakow", prefixes(), ServiceValues::default());
        let mut groups = ClusterConfig::new();
        groups.insert(
            "managers".to_string(),
            vec![NodeName::from_ordinal(0), NodeName::from_ordinal(2)],
        );
        svc.set_cluster_config(groups);

        let values = svc.rendered_values();
        assert_eq!(values.host_path_prefix.as_deref(), Some("/home/u"));
        assert_eq!(
            values.extra.get("oneprovider_nodes_count").and_then(Value::as_u64),
            Some(1)
        );
        let managers = values.extra["cluster_config"]["managers"].as_sequence().unwrap();
        assert_eq!(managers, &vec![Value::from(0u64), Value::from(2u64)]);
    }

    #[test]
    fn root_relative_path() {
        assert_eq!(relative_to_root(Path::new("/opt/build")), "opt/build");
    }
}
