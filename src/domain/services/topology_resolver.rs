//! Topology resolution
//!
//! Turns a scenario plus user overrides into per-service nodes and the Helm
//! values that describe them. For every (node, app) pair the resolver
//! decides whether the app runs from a host checkout or from the packaged
//! image; sourced apps are located through the [`SourceLocator`] port.
//!
//! The node descriptors and the rendered values are produced from the same
//! pass so they can never disagree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};

use crate::domain::entities::{
    Application, ClusterConfig, DeployFromSources, Node, NodeSources, PathPrefixes, Scenario,
    Service, ServiceSources, ServiceValues, SourceEntry, SourcesOverride, UserOverrides,
};
use crate::domain::ports::SourceLocator;
use crate::domain::value_objects::{
    client_pod_substring, gen_pod_name, parse_node_num, AppName, NodeName, ServiceRole,
};
use crate::error::KubesrcResult;

/// Home directories on the host and as seen by the cluster VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    pub home_dir: PathBuf,
    pub kube_home_dir: PathBuf,
}

/// A sourced application of a stateful-set pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub pod: String,
    pub app: AppName,
    pub path: PathBuf,
}

/// A thin-client binary directory for every pod of a client service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub pod_substring: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTopology {
    pub scenario_key: String,
    pub services: Vec<Service>,
    pub sources: Vec<SourceRecord>,
    pub clients: Vec<ClientRecord>,
}

impl ResolvedTopology {
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.services.iter().flat_map(|s| s.nodes())
    }

    /// `{scenario_key: {service: values}}`, ready to be written as a
    /// values file
    pub fn values_document(&self) -> KubesrcResult<Mapping> {
        let mut services = Mapping::new();
        for service in &self.services {
            services.insert(
                Value::from(service.name()),
                serde_yaml_ng::to_value(service.rendered_values())?,
            );
        }
        let mut doc = Mapping::new();
        doc.insert(Value::from(self.scenario_key.as_str()), Value::Mapping(services));
        Ok(doc)
    }
}

pub struct TopologyResolver<'a> {
    locator: &'a dyn SourceLocator,
    host: &'a HostLayout,
    release: &'a str,
    deployment_dir: &'a Path,
}

impl<'a> TopologyResolver<'a> {
    pub fn new(
        locator: &'a dyn SourceLocator,
        host: &'a HostLayout,
        release: &'a str,
        deployment_dir: &'a Path,
    ) -> Self {
        Self {
            locator,
            host,
            release,
            deployment_dir,
        }
    }

    pub fn resolve(
        &self,
        scenario: &Scenario,
        overrides: &UserOverrides,
    ) -> KubesrcResult<ResolvedTopology> {
        let mut topology = ResolvedTopology {
            scenario_key: scenario.key.clone(),
            services: Vec::new(),
            sources: Vec::new(),
            clients: Vec::new(),
        };
        let mut located = BTreeMap::new();

        for (name, values) in &scenario.services {
            let service =
                self.resolve_service(name, values.clone(), overrides, &mut located, &mut topology)?;
            topology.services.push(service);
        }
        Ok(topology)
    }

    fn resolve_service(
        &self,
        name: &str,
        mut values: ServiceValues,
        overrides: &UserOverrides,
        located: &mut BTreeMap<AppName, PathBuf>,
        topology: &mut ResolvedTopology,
    ) -> KubesrcResult<Service> {
        let role = ServiceRole::from_service_name(name);

        let mut cluster = ClusterConfig::new();
        if let Some(service_override) = overrides.service(name)? {
            values = merge_values(values, &service_override.values)?;
            for (group, aliases) in service_override.cluster_config.unwrap_or_default() {
                let nodes = aliases
                    .iter()
                    .map(|alias| parse_node_num(alias).map(NodeName::from_ordinal))
                    .collect::<KubesrcResult<Vec<_>>>()?;
                cluster.insert(group, nodes);
            }
        }

        let explicit = apply_sources_override(
            name,
            role,
            &mut values.deploy_from_sources,
            &overrides.sources,
        )?;
        if role != ServiceRole::Client {
            fill_nodes(role, &mut values.deploy_from_sources, &cluster, explicit);
        }

        let prefixes = PathPrefixes {
            host_path_prefix: self.host.home_dir.display().to_string(),
            vm_path_prefix: self.host.kube_home_dir.display().to_string(),
            deployment_dir: relpath(self.deployment_dir, &self.host.home_dir),
        };
        let dfs = values.deploy_from_sources.clone();
        let mut service = Service::new(name, prefixes, values);
        service.set_cluster_config(cluster);

        let outside_home = match role {
            ServiceRole::Client => self.resolve_client(&mut service, &dfs, topology)?,
            _ => self.resolve_nodes(&mut service, &dfs, located, topology)?,
        };
        if outside_home {
            tracing::info!(service = %name, "sources outside the home directory, using absolute paths");
            service.apply_override_prefix(self.deployment_dir);
        }
        Ok(service)
    }

    /// Returns whether any located path lies outside the home directory
    fn resolve_nodes(
        &self,
        service: &mut Service,
        dfs: &DeployFromSources,
        located: &mut BTreeMap<AppName, PathBuf>,
        topology: &mut ResolvedTopology,
    ) -> KubesrcResult<bool> {
        let mut outside_home = false;

        for (&node_name, node_cfg) in &dfs.nodes {
            let pod = gen_pod_name(self.release, service.name(), node_name);
            let mut apps = Vec::new();
            let mut entries = Vec::new();

            for &app in service.role().apps() {
                if !(dfs.enabled && node_cfg.lists(app)) {
                    apps.push(Application::packaged(app));
                    entries.push(SourceEntry {
                        name: app,
                        host_path: Some(String::new()),
                    });
                    continue;
                }

                let location = match located.get(&app) {
                    Some(path) => path.clone(),
                    None => {
                        let path = self.locator.locate(app)?;
                        located.insert(app, path.clone());
                        path
                    }
                };
                let (host_path, outside) = self.host_path(&location);
                outside_home |= outside;
                tracing::info!(pod = %pod, app = %app, path = %location.display(), "using sources");

                topology.sources.push(SourceRecord {
                    pod: pod.clone(),
                    app,
                    path: location.clone(),
                });
                entries.push(SourceEntry {
                    name: app,
                    host_path: Some(host_path),
                });
                apps.push(Application::sourced(app, location));
            }

            let node = Node::new(node_name, service.name(), apps, self.deployment_dir);
            service.push_node(node, entries);
        }
        Ok(outside_home)
    }

    fn resolve_client(
        &self,
        service: &mut Service,
        dfs: &DeployFromSources,
        topology: &mut ResolvedTopology,
    ) -> KubesrcResult<bool> {
        if !dfs.enabled {
            return Ok(false);
        }
        let build = dfs.extra.get("type").and_then(Value::as_str);
        let dir = self.locator.locate_client(build)?;
        let (host_path, outside) = self.host_path(&dir);
        let pod_substring = client_pod_substring(self.release, service.name());
        tracing::info!(pod = %pod_substring, path = %dir.display(), "using client binaries");

        service
            .values_mut()
            .deploy_from_sources
            .extra
            .insert(Value::from("hostPath"), Value::from(host_path));
        topology.clients.push(ClientRecord {
            pod_substring,
            path: dir,
        });
        Ok(outside)
    }

    /// Home-relative path, or the absolute path and `true` when outside home
    fn host_path(&self, location: &Path) -> (String, bool) {
        match location.strip_prefix(&self.host.home_dir) {
            Ok(rel) => (rel.display().to_string(), false),
            Err(_) => (location.display().to_string(), true),
        }
    }
}

/// Apply the `sources` override to one service. Returns `true` when the
/// override listed this service's nodes explicitly.
fn apply_sources_override(
    name: &str,
    role: ServiceRole,
    dfs: &mut DeployFromSources,
    sources: &SourcesOverride,
) -> KubesrcResult<bool> {
    match sources {
        SourcesOverride::All(enabled) => {
            if *enabled {
                dfs.enabled = true;
            }
            Ok(false)
        }
        SourcesOverride::PerService(_) => {
            let Some(entry) = sources.service(name) else {
                return Ok(false);
            };
            match entry {
                ServiceSources::Enabled(enabled) => {
                    dfs.enabled = *enabled;
                    Ok(false)
                }
                ServiceSources::Build(build) => {
                    dfs.enabled = true;
                    dfs.extra
                        .insert(Value::from("type"), Value::from(build.as_str()));
                    Ok(false)
                }
                ServiceSources::Nodes(nodes) => {
                    dfs.enabled = true;
                    if role == ServiceRole::Client {
                        return Ok(false);
                    }
                    for cfg in dfs.nodes.values_mut() {
                        cfg.sources.clear();
                    }
                    for (alias, apps) in nodes {
                        let node = NodeName::from_ordinal(parse_node_num(alias)?);
                        let sources = apps.iter().copied().map(SourceEntry::named).collect();
                        dfs.nodes.insert(node, NodeSources { sources });
                    }
                    Ok(true)
                }
            }
        }
    }
}

/// Give every cluster node a source list and make sure the service has at
/// least its baseline node.
///
/// Unconfigured nodes clone the baseline `n0` unless the user listed nodes
/// explicitly, in which case they run packaged. A missing baseline counts as
/// "every canonical app".
fn fill_nodes(
    role: ServiceRole,
    dfs: &mut DeployFromSources,
    cluster: &ClusterConfig,
    explicit: bool,
) {
    let baseline = dfs.nodes.get(&NodeName::BASELINE).cloned().unwrap_or_else(|| NodeSources {
        sources: role.apps().iter().copied().map(SourceEntry::named).collect(),
    });

    let cluster_nodes: BTreeSet<NodeName> = cluster.values().flatten().copied().collect();
    for node in cluster_nodes {
        dfs.nodes.entry(node).or_insert_with(|| {
            if explicit {
                NodeSources::default()
            } else {
                baseline.clone()
            }
        });
    }
    if dfs.nodes.is_empty() {
        dfs.nodes.insert(NodeName::BASELINE, baseline);
    }
}

/// Shallow merge of override values over the scenario's service values
fn merge_values(values: ServiceValues, overrides: &Mapping) -> KubesrcResult<ServiceValues> {
    if overrides.is_empty() {
        return Ok(values);
    }
    let mut merged = match serde_yaml_ng::to_value(&values)? {
        Value::Mapping(mapping) => mapping,
        _ => return Ok(values),
    };
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    Ok(serde_yaml_ng::from_value(Value::Mapping(merged))?)
}

/// `path` relative to `base`, walking up with `..` where needed
fn relpath(path: &Path, base: &Path) -> String {
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &path[common..] {
        rel.push(component);
    }
    rel.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KubesrcError;

    struct FakeLocator {
        apps: BTreeMap<AppName, PathBuf>,
        client: Option<PathBuf>,
        requested_build: std::sync::Mutex<Option<String>>,
    }

    impl FakeLocator {
        fn with(apps: &[(AppName, &str)]) -> Self {
            Self {
                apps: apps.iter().map(|(a, p)| (*a, PathBuf::from(p))).collect(),
                client: None,
                requested_build: std::sync::Mutex::new(None),
            }
        }
    }

    impl SourceLocator for FakeLocator {
        fn locate(&self, app: AppName) -> KubesrcResult<PathBuf> {
            self.apps.get(&app).cloned().ok_or_else(|| KubesrcError::Locate {
                app: app.to_string(),
                tried: vec![PathBuf::from(format!("/w/{app}"))],
            })
        }

        fn locate_client(&self, build: Option<&str>) -> KubesrcResult<PathBuf> {
            *self.requested_build.lock().unwrap() = build.map(str::to_string);
            self.client.clone().ok_or_else(|| KubesrcError::Locate {
                app: "oneclient".to_string(),
                tried: vec![PathBuf::from("/w/oneclient/release")],
            })
        }
    }

    fn host() -> HostLayout {
        HostLayout {
            home_dir: PathBuf::from("/home/u"),
            kube_home_dir: PathBuf::from("/hosthome"),
        }
    }

    const DEPLOYMENT: &str = "/home/u/.kubesrc/deployments/2024.01.01-10.00.00";

    fn scenario(text: &str) -> Scenario {
        Scenario::from_yaml(Path::new("scenario.yaml"), text).unwrap()
    }

    fn overrides(text: &str) -> UserOverrides {
        UserOverrides::from_yaml(Path::new("overrides.yaml"), text).unwrap()
    }

    const ONE_WORKER: &str = r#"
onedata-1p:
  onezone:
    deployFromSources:
      enabled: true
      nodes:
        n0:
          sources:
            - name: oz-worker
"#;

    fn resolve(locator: &FakeLocator, scenario_text: &str, overrides_text: &str) -> KubesrcResult<ResolvedTopology> {
        let host = host();
        let resolver = TopologyResolver::new(locator, &host, "dev", Path::new(DEPLOYMENT));
        resolver.resolve(&scenario(scenario_text), &overrides(overrides_text))
    }

    fn host_path_of(service: &ServiceValues, node: NodeName, app: AppName) -> Option<String> {
        service.deploy_from_sources.nodes[&node]
            .sources
            .iter()
            .find(|s| s.name == app)
            .and_then(|s| s.host_path.clone())
    }

    #[test]
    fn source_under_home_is_home_relative() {
        let locator = FakeLocator::with(&[(AppName::OzWorker, "/home/u/worker-src")]);
        let topology = resolve(&locator, ONE_WORKER, "").unwrap();

        let zone = topology.service("onezone").unwrap();
        assert!(!zone.override_prefix());
        let values = zone.rendered_values();
        assert_eq!(
            host_path_of(&values, NodeName::BASELINE, AppName::OzWorker).as_deref(),
            Some("worker-src")
        );
        assert_eq!(values.host_path_prefix.as_deref(), Some("/home/u"));
        assert_eq!(values.vm_path_prefix.as_deref(), Some("/hosthome"));
        assert_eq!(
            values.deployment_dir.as_deref(),
            Some(".kubesrc/deployments/2024.01.01-10.00.00")
        );
    }

    #[test]
    fn source_outside_home_switches_service_to_absolute_paths() {
        let locator = FakeLocator::with(&[(AppName::OzWorker, "/opt/build/worker-src")]);
        let topology = resolve(&locator, ONE_WORKER, "").unwrap();

        let zone = topology.service("onezone").unwrap();
        assert!(zone.override_prefix());
        assert_eq!(zone.prefixes().host_path_prefix, "");
        assert_eq!(zone.prefixes().vm_path_prefix, "");
        assert_eq!(
            zone.prefixes().deployment_dir,
            "home/u/.kubesrc/deployments/2024.01.01-10.00.00"
        );
        let values = zone.rendered_values();
        assert_eq!(
            host_path_of(&values, NodeName::BASELINE, AppName::OzWorker).as_deref(),
            Some("/opt/build/worker-src")
        );
    }

    #[test]
    fn mixed_service_uses_absolute_paths_for_every_sourced_app() {
        let locator = FakeLocator::with(&[
            (AppName::OzWorker, "/opt/build/oz-worker"),
            (AppName::OzPanel, "/home/u/onepanel"),
        ]);
        let text = ONE_WORKER.replace(
            "            - name: oz-worker\n",
            "            - name: oz-worker\n            - name: oz-panel\n",
        );
        let topology = resolve(&locator, &text, "").unwrap();

        let zone = topology.service("onezone").unwrap();
        assert!(zone.override_prefix());
        let values = zone.rendered_values();
        assert_eq!(values.host_path_prefix.as_deref(), Some(""));
        assert_eq!(
            host_path_of(&values, NodeName::BASELINE, AppName::OzPanel).as_deref(),
            Some("/home/u/onepanel")
        );
        assert_eq!(
            host_path_of(&values, NodeName::BASELINE, AppName::OzWorker).as_deref(),
            Some("/opt/build/oz-worker")
        );
        assert_eq!(
            host_path_of(&values, NodeName::BASELINE, AppName::ClusterManager).as_deref(),
            Some("")
        );
    }

    #[test]
    fn nodes_carry_full_app_set_with_sourced_worker() {
        let locator = FakeLocator::with(&[(AppName::OzWorker, "/home/u/worker-src")]);
        let topology = resolve(&locator, ONE_WORKER, "").unwrap();

        let node = topology.nodes().next().unwrap();
        let names: Vec<AppName> = node.apps().iter().map(Application::name).collect();
        assert_eq!(names, vec![AppName::OzPanel, AppName::ClusterManager, AppName::OzWorker]);
        assert_eq!(node.apps()[2].source_path(), Some(Path::new("/home/u/worker-src")));
        assert_eq!(node.apps()[0].source_path(), None);
        assert!(node.panel().is_ok());

        assert_eq!(
            topology.sources,
            vec![SourceRecord {
                pod: "dev-onezone-0".to_string(),
                app: AppName::OzWorker,
                path: PathBuf::from("/home/u/worker-src"),
            }]
        );
    }

    #[test]
    fn disabled_sources_keep_everything_packaged() {
        let text = ONE_WORKER.replace("enabled: true", "enabled: false");
        let topology = resolve(&FakeLocator::with(&[]), &text, "").unwrap();
        assert!(topology.sources.is_empty());
        assert!(topology.nodes().all(|n| n.apps().iter().all(|a| a.source_path().is_none())));
    }

    #[test]
    fn missing_source_is_fatal() {
        let err = resolve(&FakeLocator::with(&[]), ONE_WORKER, "").unwrap_err();
        assert!(matches!(err, KubesrcError::Locate { .. }));
    }

    #[test]
    fn global_sources_clone_baseline_onto_cluster_nodes() {
        let locator = FakeLocator::with(&[(AppName::OzWorker, "/home/u/worker-src")]);
        let text = ONE_WORKER.replace("enabled: true", "enabled: false");
        let topology = resolve(
            &locator,
            &text,
            "sources: true\nonezone:\n  clusterConfig:\n    managers: [node-1, node-3]\n",
        )
        .unwrap();

        let zone = topology.service("onezone").unwrap();
        let nodes: Vec<String> = zone.nodes().iter().map(|n| n.node_name().to_string()).collect();
        assert_eq!(nodes, vec!["n0", "n2"]);
        let pods: Vec<&str> = topology.sources.iter().map(|s| s.pod.as_str()).collect();
        assert_eq!(pods, vec!["dev-onezone-0", "dev-onezone-2"]);

        let values = zone.rendered_values();
        assert_eq!(values.extra.get("onezone_nodes_count").and_then(Value::as_u64), Some(2));
    }

    #[test]
    fn per_service_sources_list_exact_apps() {
        let locator = FakeLocator::with(&[
            (AppName::OzWorker, "/home/u/worker-src"),
            (AppName::OzPanel, "/home/u/onepanel"),
        ]);
        let topology = resolve(
            &locator,
            ONE_WORKER,
            "sources:\n  onezone:\n    node-2: [oz-panel]\n",
        )
        .unwrap();

        let zone = topology.service("onezone").unwrap();
        let n0 = zone.node(NodeName::from_ordinal(0)).unwrap();
        assert!(n0.apps().iter().all(|a| a.source_path().is_none()));
        let n1 = zone.node(NodeName::from_ordinal(1)).unwrap();
        assert_eq!(n1.panel().unwrap().source_path(), Some(Path::new("/home/u/onepanel")));
        assert_eq!(topology.sources.len(), 1);
        assert_eq!(topology.sources[0].pod, "dev-onezone-1");
    }

    #[test]
    fn numbered_provider_alias_selects_named_service() {
        let locator = FakeLocator::with(&[(AppName::OpWorker, "/home/u/op-worker")]);
        let text = "onedata-1p:\n  oneprovider-krakow:\n    deployFromSources:\n      enabled: false\n";
        let topology = resolve(
            &locator,
            text,
            "sources:\n  oneprovider-1:\n    node-1: [op-worker]\noneprovider-1:\n  clusterConfig:\n    managers: [node-1]\n",
        )
        .unwrap();

        assert_eq!(topology.sources.len(), 1);
        assert_eq!(topology.sources[0].pod, "dev-oneprovider-krakow-0");
        let values = topology.service("oneprovider-krakow").unwrap().rendered_values();
        assert!(values.deploy_from_sources.enabled);
        assert!(values.extra.contains_key("cluster_config"));
    }

    #[test]
    fn invalid_node_alias_is_rejected() {
        let err = resolve(
            &FakeLocator::with(&[]),
            ONE_WORKER,
            "sources:\n  onezone:\n    node-0: [oz-panel]\n",
        )
        .unwrap_err();
        assert!(matches!(err, KubesrcError::InvalidNodeName { .. }));
    }

    #[test]
    fn override_values_are_merged_into_service() {
        let text = ONE_WORKER.replace("enabled: true", "enabled: false");
        let topology = resolve(&FakeLocator::with(&[]), &text, "onezone:\n  image: custom:1\n").unwrap();
        let values = topology.service("onezone").unwrap().rendered_values();
        assert_eq!(values.extra.get("image").and_then(Value::as_str), Some("custom:1"));
    }

    #[test]
    fn sourced_client_is_recorded_by_pod_substring() {
        let mut locator = FakeLocator::with(&[]);
        locator.client = Some(PathBuf::from("/home/u/oneclient/release"));
        let text = "onedata-1p:\n  oneclient-krakow:\n    deployFromSources:\n      enabled: true\n";
        let topology = resolve(&locator, text, "").unwrap();

        assert_eq!(
            topology.clients,
            vec![ClientRecord {
                pod_substring: "dev-oneclient-krakow".to_string(),
                path: PathBuf::from("/home/u/oneclient/release"),
            }]
        );
        let client = topology.service("oneclient-krakow").unwrap();
        assert!(client.nodes().is_empty());
        let values = client.rendered_values();
        assert_eq!(
            values.deploy_from_sources.extra.get("hostPath").and_then(Value::as_str),
            Some("oneclient/release")
        );
    }

    #[test]
    fn client_build_type_reaches_the_locator() {
        let mut locator = FakeLocator::with(&[]);
        locator.client = Some(PathBuf::from("/home/u/oneclient/debug"));
        let text = "onedata-1p:\n  oneclient-krakow:\n    deployFromSources:\n      enabled: false\n";
        let topology = resolve(&locator, text, "sources:\n  oneclient-krakow: debug\n").unwrap();

        assert_eq!(locator.requested_build.lock().unwrap().as_deref(), Some("debug"));
        let values = topology.service("oneclient-krakow").unwrap().rendered_values();
        assert_eq!(
            values.deploy_from_sources.extra.get("type").and_then(Value::as_str),
            Some("debug")
        );
    }

    #[test]
    fn values_document_is_keyed_by_scenario() {
        let locator = FakeLocator::with(&[(AppName::OzWorker, "/home/u/worker-src")]);
        let topology = resolve(&locator, ONE_WORKER, "").unwrap();
        let doc = topology.values_document().unwrap();
        let zone = &doc["onedata-1p"]["onezone"];
        assert_eq!(zone["deployFromSources"]["enabled"].as_bool(), Some(true));
        assert_eq!(zone["hostPathPrefix"].as_str(), Some("/home/u"));
    }

    #[test]
    fn relpath_walks_up() {
        assert_eq!(relpath(Path::new("/mnt/d"), Path::new("/home/u")), "../../mnt/d");
        assert_eq!(relpath(Path::new("/home/u/a/b"), Path::new("/home/u")), "a/b");
    }
}
