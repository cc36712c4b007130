//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KubesrcError, KubesrcResult};

use super::types::Config;
use super::ConfigWarning;

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> KubesrcResult<(Config, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| KubesrcError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                suggestion: suggest_key(&key),
                key,
                path: path_str,
                file: path.to_path_buf(),
            }
        })
        .collect();

    Ok((config, warnings))
}

/// `$KUBESRC_CONFIG`, else `~/.kubesrc/config.toml`
pub fn config_path() -> PathBuf {
    std::env::var("KUBESRC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| kubesrc_dir().join("config.toml"))
}

pub(crate) fn kubesrc_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".kubesrc"))
        .unwrap_or_else(|| PathBuf::from(".kubesrc"))
}

/// Load the user config (or defaults when absent) with env overrides applied
pub fn load_or_default() -> KubesrcResult<(Config, Vec<ConfigWarning>)> {
    let path = config_path();
    let (config, warnings) = if path.exists() {
        load_with_warnings(&path)?
    } else {
        (Config::default(), Vec::new())
    };
    Ok((with_env_overrides(config), warnings))
}

/// Apply environment variable overrides (KUBESRC_* prefix)
pub fn with_env_overrides(config: Config) -> Config {
    with_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides read through `lookup`
pub fn with_overrides_from<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ns) = lookup("KUBESRC_NAMESPACE") {
        config.cluster.namespace = ns;
    }
    if let Some(release) = lookup("KUBESRC_RELEASE") {
        config.cluster.release_name = release;
    }
    if let Some(home) = lookup("KUBESRC_HOST_HOME") {
        config.host.home_dir = Some(PathBuf::from(home));
    }
    if let Some(home) = lookup("KUBESRC_KUBE_HOST_HOME") {
        config.host.kube_home_dir = Some(PathBuf::from(home));
    }
    if let Some(workers) = lookup("KUBESRC_SYNC_WORKERS").and_then(|v| v.parse().ok()) {
        config.sync.workers = workers;
    }
    if let Some(secs) = lookup("KUBESRC_READINESS_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.sync.readiness_timeout_secs = secs;
    }
    config
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "host",
        "home_dir",
        "kube_home_dir",
        "cluster",
        "namespace",
        "release_name",
        "sync",
        "workers",
        "readiness_timeout_secs",
        "poll_interval_ms",
        "watch",
        "batch_size",
        "initial_sync",
        "deployments",
        "dir",
        "max_history",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = if ac == bc { 0 } else { 1 };
            curr[j + 1] =
                std::cmp::min(std::cmp::min(prev[j + 1] + 1, curr[j] + 1), prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
