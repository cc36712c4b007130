//! Tests for the config module

use super::types::*;
use super::{load_with_warnings, with_overrides_from};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.cluster.namespace, "default");
    assert_eq!(config.cluster.release_name, "dev");
    assert_eq!(config.sync.workers, 4);
    assert_eq!(config.sync.readiness_timeout(), Duration::from_secs(300));
    assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.watch.batch_size, 1000);
    assert!(config.watch.initial_sync);
    assert_eq!(config.deployments.max_history, 10);
}

#[test]
fn test_config_parse_toml() {
    let toml = r#"
[host]
home_dir = "/home/u"
kube_home_dir = "/hosthome"

[cluster]
namespace = "onedata"

[sync]
workers = 8

[watch]
batch_size = 50
"#;

    let config: Config = toml::from_str(toml).unwrap();

    assert_eq!(config.home_dir(), PathBuf::from("/home/u"));
    assert_eq!(config.kube_home_dir(), PathBuf::from("/hosthome"));
    assert_eq!(config.cluster.namespace, "onedata");
    assert_eq!(config.cluster.release_name, "dev");
    assert_eq!(config.sync.workers, 8);
    assert_eq!(config.sync.readiness_timeout_secs, 300);
    assert_eq!(config.watch.batch_size, 50);
}

#[test]
fn test_kube_home_defaults_to_host_home() {
    let toml = "[host]\nhome_dir = \"/home/u\"\n";
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.kube_home_dir(), PathBuf::from("/home/u"));
}

#[test]
fn test_unknown_keys_become_warnings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sync]\nwokers = 2\n\n[cluster]\nnamespace = \"x\"\n").unwrap();

    let (config, warnings) = load_with_warnings(&path).unwrap();

    assert_eq!(config.cluster.namespace, "x");
    assert_eq!(config.sync.workers, 4);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].key, "wokers");
    assert_eq!(warnings[0].path, "sync.wokers");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("workers"));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[sync]\nworkers = \"many\"\n").unwrap();

    let err = load_with_warnings(&path).unwrap_err();
    assert!(matches!(err, crate::error::KubesrcError::Config { .. }));
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = [
        ("KUBESRC_NAMESPACE", "ns2"),
        ("KUBESRC_RELEASE", "r2"),
        ("KUBESRC_HOST_HOME", "/h"),
        ("KUBESRC_SYNC_WORKERS", "2"),
        ("KUBESRC_READINESS_TIMEOUT", "oops"),
    ]
    .into_iter()
    .collect();

    let config = with_overrides_from(Config::default(), |k| env.get(k).map(|v| v.to_string()));

    assert_eq!(config.cluster.namespace, "ns2");
    assert_eq!(config.cluster.release_name, "r2");
    assert_eq!(config.home_dir(), PathBuf::from("/h"));
    assert_eq!(config.sync.workers, 2);
    // unparsable values are ignored
    assert_eq!(config.sync.readiness_timeout_secs, 300);
}
