//! End-to-end resolution against real checkouts on disk.

mod common;

use std::fs;
use std::sync::Arc;

use kubesrc::application::{ResolveOptions, ResolveUseCase};
use kubesrc::domain::entities::DeploymentState;
use kubesrc::domain::ports::DeploymentStateStore;
use kubesrc::domain::services::HostLayout;
use kubesrc::infrastructure::{FsSourceLocator, YamlStateStore};
use kubesrc::{AppName, KubesrcError};
use serde_yaml_ng::Value;
use tempfile::tempdir;

use common::{checkout, write, TWO_PROVIDER_SCENARIO};

struct Workspace {
    _dir: tempfile::TempDir,
    home: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap();
        Self { _dir: dir, home }
    }

    fn options(&self, overrides: Option<&str>) -> ResolveOptions {
        let scenario = write(&self.home.join("scenario.yaml"), TWO_PROVIDER_SCENARIO);
        let overrides = overrides.map(|text| write(&self.home.join("overrides.yaml"), text));
        ResolveOptions {
            scenario,
            overrides,
            host: HostLayout {
                home_dir: self.home.clone(),
                kube_home_dir: self.home.clone(),
            },
            release: "dev".to_string(),
            deployment_dir: self.home.join(".kubesrc/deployments/2024.05.01-09.00.00"),
        }
    }

    fn resolve(&self, options: &ResolveOptions) -> Result<kubesrc::application::ResolveResult, KubesrcError> {
        let store = Arc::new(YamlStateStore::in_deployment(&options.deployment_dir));
        let locator = Arc::new(FsSourceLocator::new(&self.home.join("work")));
        ResolveUseCase::new(locator, store).execute(options)
    }
}

#[test]
fn per_service_sources_record_only_listed_apps() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.home.join("work")).unwrap();
    let worker = checkout(&ws.home, "op-worker", "op_worker");

    let options = ws.options(Some("sources:\n  oneprovider-krakow:\n    node-1: [op-worker]\n"));
    let result = ws.resolve(&options).unwrap();

    assert_eq!(result.topology.sources.len(), 1);
    assert_eq!(result.topology.sources[0].pod, "dev-oneprovider-krakow-0");
    assert_eq!(result.topology.sources[0].path, worker);

    let store = YamlStateStore::in_deployment(&options.deployment_dir);
    let state = store.get(DeploymentState::default()).unwrap();
    assert_eq!(
        state.source_path("dev-oneprovider-krakow-0", AppName::OpWorker),
        Some(worker.as_path())
    );

    let values: Value = serde_yaml_ng::from_str(&fs::read_to_string(&result.values_file).unwrap()).unwrap();
    let krakow = &values["onedata-2p"]["oneprovider-krakow"];
    assert_eq!(krakow["deployFromSources"]["enabled"].as_bool(), Some(true));
    assert_eq!(krakow["oneprovider_nodes_count"].as_u64(), Some(1));
    let sources = krakow["deployFromSources"]["nodes"]["n0"]["sources"].as_sequence().unwrap();
    let host_path = |app: &str| {
        sources
            .iter()
            .find(|s| s["name"].as_str() == Some(app))
            .and_then(|s| s["hostPath"].as_str())
    };
    assert_eq!(host_path("op-worker"), Some("op-worker"));
    assert_eq!(host_path("op-panel"), Some(""));
    // Services the overrides do not name stay packaged.
    assert_eq!(values["onedata-2p"]["onezone"]["deployFromSources"]["enabled"].as_bool(), Some(false));
    assert_eq!(values["onedata-2p"]["onezone"]["image"].as_str(), Some("onedata/onezone:develop"));
}

#[test]
fn every_node_gets_an_overlay_config() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.home.join("work")).unwrap();
    let options = ws.options(None);
    let result = ws.resolve(&options).unwrap();

    let mut overlays: Vec<_> = result
        .overlay_files
        .iter()
        .map(|p| p.strip_prefix(&options.deployment_dir).unwrap().to_path_buf())
        .collect();
    overlays.sort();
    assert_eq!(
        overlays,
        vec![
            std::path::PathBuf::from("oneprovider-krakow/n0/overlay.config"),
            std::path::PathBuf::from("oneprovider-paris/n0/overlay.config"),
            std::path::PathBuf::from("onezone/n0/overlay.config"),
        ]
    );
    assert!(result.topology.sources.is_empty());
}

#[test]
fn missing_checkout_lists_every_place_searched() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.home.join("work")).unwrap();
    let options = ws.options(Some("sources: true\n"));

    let err = ws.resolve(&options).unwrap_err();
    let KubesrcError::Locate { tried, .. } = &err else {
        panic!("expected a locate error, got {err}");
    };
    assert!(tried.len() >= 3);
    assert!(err.to_string().starts_with("cannot locate sources for"));
}
