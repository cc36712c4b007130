//! Sync engine
//!
//! Pushes host checkouts into the pods recorded in the deployment state.
//! Every pod is an independent job: a pod that never becomes ready, or a
//! transfer that fails, only affects that pod.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::pool::{JobKey, WorkerPool};
use super::report::{PodOutcome, SyncReport};
use crate::config::Config;
use crate::domain::entities::{
    rel_sources_dir, Application, DeploymentState, Node, APP_CONFIG_FILE, CLIENT_APP_KEY,
};
use crate::domain::ports::{
    ClusterApi, DeploymentStateStore, PodInfo, TransferError, TransferRequest, Transport,
};
use crate::domain::value_objects::{pod_matches, pod_node, AppName, ServiceRole};
use crate::error::{KubesrcError, KubesrcResult};
use crate::infrastructure::fs::logs_dir;

/// Checkout subdirectories pushed into pods
pub const SYNCED_DIRS: [&str; 4] = ["_build", "priv", "src", "include"];

/// Pod-local release state that a transfer must not overwrite
pub const TRANSFER_EXCLUDES: &[&str] = &["rel/*/etc/", "rel/*/log/"];

/// Marker the pod entrypoints wait for before starting applications
pub const SENTINEL_FILE: &str = "/tmp/sources_ready.txt";

/// Where client binaries land inside client pods
pub const CLIENT_BIN_PATH: &str = "/usr/local/bin";

/// Files under `/etc/<app>` carried into the synced release
const CONTINUITY_ITEMS: [&str; 4] = ["overlay.config", "auth.config", "certs", "cacerts"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub release: String,
    pub workers: usize,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            release: config.cluster.release_name.clone(),
            workers: config.sync.workers,
            readiness_timeout: config.sync.readiness_timeout(),
            poll_interval: config.sync.poll_interval(),
        }
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    cluster: Arc<dyn ClusterApi>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn DeploymentStateStore>,
    deployment_dir: PathBuf,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn DeploymentStateStore>,
        deployment_dir: impl Into<PathBuf>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            cluster,
            transport,
            store,
            deployment_dir: deployment_dir.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    pub fn deployment_dir(&self) -> &Path {
        &self.deployment_dir
    }

    /// Per-pod transfer log, `<deployment>/logs/<pod>_rsync.log`
    pub fn log_file(&self, pod: &str) -> PathBuf {
        logs_dir(&self.deployment_dir).join(format!("{pod}_rsync.log"))
    }

    /// Current deployment state; fails before anything is touched when the
    /// deployment was not started from sources.
    pub fn load_state(&self) -> KubesrcResult<DeploymentState> {
        if !self.store.exists() {
            return Err(KubesrcError::MissingState {
                path: self.store.location(),
            });
        }
        Ok(self.store.get(DeploymentState::default())?)
    }

    /// Sync every pod and client deployment recorded in the state
    ///
    /// `pod_filter` restricts the run to stateful-set pods and client pod
    /// substrings it matches (`-` is a wildcard).
    pub fn sync_all(&self, pod_filter: Option<&str>) -> KubesrcResult<SyncReport> {
        let state = self.load_state()?;
        let selected = |name: &str| pod_filter.map_or(true, |f| pod_matches(f, name));
        let (tx, rx) = mpsc::channel::<PodOutcome>();
        let pool = WorkerPool::new(self.settings.workers);
        let mut jobs: Vec<(String, Arc<AtomicBool>)> = Vec::new();

        for pod in state.sources.keys().filter(|p| selected(p)) {
            let engine = self.clone();
            let sources = state.pod_sources(pod);
            let pod_name = pod.clone();
            let tx = tx.clone();
            let reported = Arc::new(AtomicBool::new(false));
            jobs.push((pod.clone(), Arc::clone(&reported)));
            pool.submit(JobKey::pod(pod.as_str()), move || {
                let _ = tx.send(engine.sync_pod(&pod_name, &sources));
                reported.store(true, Ordering::SeqCst);
            });
        }

        for (pattern, apps) in state.oc_deployments.iter().filter(|(p, _)| selected(p)) {
            let Some(dir) = apps.get(CLIENT_APP_KEY).cloned() else {
                continue;
            };
            let engine = self.clone();
            let pattern_owned = pattern.clone();
            let tx = tx.clone();
            let reported = Arc::new(AtomicBool::new(false));
            jobs.push((pattern.clone(), Arc::clone(&reported)));
            pool.submit(JobKey::app(pattern.as_str(), AppName::Oneclient), move || {
                for outcome in engine.sync_clients(&pattern_owned, &dir) {
                    let _ = tx.send(outcome);
                }
                reported.store(true, Ordering::SeqCst);
            });
        }

        if let (Some(pattern), true) = (pod_filter, jobs.is_empty()) {
            return Err(KubesrcError::NoMatchingPods {
                pattern: pattern.to_string(),
            });
        }

        drop(tx);
        pool.join();

        let mut report = SyncReport::default();
        for outcome in rx {
            report.push(outcome);
        }
        // A job that panicked never reported; count its pod as abandoned
        for (pod, reported) in &jobs {
            if !reported.load(Ordering::SeqCst) && !report.pods.iter().any(|o| &o.pod == pod) {
                report.push(PodOutcome::abandoned(pod.as_str(), "sync job panicked"));
            }
        }
        report.sort();
        tracing::info!(
            synced = report.synced().count(),
            failed = report.failed().count(),
            abandoned = report.abandoned().count(),
            "sync finished"
        );
        Ok(report)
    }

    /// Full sync of one stateful-set pod
    pub fn sync_pod(&self, pod: &str, sources: &[(AppName, PathBuf)]) -> PodOutcome {
        let info = match self.wait_until_ready(pod) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(pod = %pod, error = %e, "abandoning pod");
                return PodOutcome::abandoned(pod, e.to_string());
            }
        };

        let mut outcome = PodOutcome::new(pod);
        let log_file = self.log_file(pod);

        for (app, source) in sources {
            self.transfer_dirs(&mut outcome, *app, source, &SYNCED_DIRS, &log_file);
            self.copy_continuity(&mut outcome, *app, source, &log_file);
        }

        let node = match self.node_for(&info, sources) {
            Ok(node) => node,
            Err(e) => {
                outcome.record("node", Err(e));
                return outcome;
            }
        };

        let patched = self.patch_panel(pod, &node, &log_file);
        let panel_ok = patched.is_ok();
        outcome.record("app.config", patched);

        if panel_ok {
            let sentinel = match node.panel().ok().and_then(Application::source_path) {
                Some(path) => self.append_sentinel(pod, path),
                None => self.touch_sentinel(pod),
            };
            outcome.record("sentinel", sentinel);
        }
        outcome
    }

    /// Push the client binary directory into every pod matching `pattern`
    pub fn sync_clients(&self, pattern: &str, dir: &Path) -> Vec<PodOutcome> {
        let pods = match self.wait_for_clients(pattern) {
            Ok(pods) => pods,
            Err(e) => {
                tracing::warn!(pod = %pattern, error = %e, "abandoning client pods");
                return vec![PodOutcome::abandoned(pattern, e.to_string())];
            }
        };

        pods.iter()
            .map(|info| {
                let mut outcome = PodOutcome::new(info.name.as_str());
                let pushed = self.push_client(&info.name, dir);
                let pushed_ok = pushed.is_ok();
                outcome.record(CLIENT_APP_KEY, pushed);
                if pushed_ok {
                    outcome.record("sentinel", self.touch_sentinel(&info.name));
                }
                outcome
            })
            .collect()
    }

    /// Incremental resync of one checkout subdirectory.
    ///
    /// The sentinel is left alone; pods are already past startup.
    pub fn resync_dir(&self, pod: &str, app: AppName, source: &Path, dir: &str) -> PodOutcome {
        let mut outcome = PodOutcome::new(pod);
        let log_file = self.log_file(pod);
        self.transfer_dirs(&mut outcome, app, source, &[dir], &log_file);
        self.copy_continuity(&mut outcome, app, source, &log_file);

        if app.is_panel() {
            let patched = self
                .load_state()
                .and_then(|state| {
                    let info = self.cluster.pod(pod)?.ok_or_else(|| KubesrcError::TransferFailed {
                        pod: pod.to_string(),
                        message: "pod no longer exists".to_string(),
                        log_file: log_file.clone(),
                    })?;
                    self.node_for(&info, &state.pod_sources(pod))
                })
                .and_then(|node| self.patch_panel(pod, &node, &log_file));
            outcome.record("app.config", patched);
        }
        outcome
    }

    /// Incremental resync of a client pod
    pub fn resync_client(&self, pod: &str, dir: &Path) -> PodOutcome {
        let mut outcome = PodOutcome::new(pod);
        outcome.record(CLIENT_APP_KEY, self.push_client(pod, dir));
        outcome
    }

    /// Poll until the pod is running with every container ready
    pub fn wait_until_ready(&self, pod: &str) -> KubesrcResult<PodInfo> {
        let timeout = self.settings.readiness_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            match self.cluster.pod(pod) {
                Ok(Some(info)) if info.is_ready() => return Ok(info),
                Ok(_) => {}
                Err(e) => tracing::debug!(pod = %pod, error = %e, "pod status unavailable"),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(KubesrcError::ReadinessTimeout {
                    pod: pod.to_string(),
                    timeout,
                });
            }
            thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }

    /// Poll until at least one pod matches `pattern` and all matches are ready
    fn wait_for_clients(&self, pattern: &str) -> KubesrcResult<Vec<PodInfo>> {
        let timeout = self.settings.readiness_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            match self.cluster.list_pods() {
                Ok(pods) => {
                    let matching: Vec<PodInfo> = pods
                        .into_iter()
                        .filter(|p| pod_matches(pattern, &p.name))
                        .collect();
                    if !matching.is_empty() && matching.iter().all(PodInfo::is_ready) {
                        return Ok(matching);
                    }
                }
                Err(e) => tracing::debug!(pod = %pattern, error = %e, "pod list unavailable"),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(KubesrcError::ReadinessTimeout {
                    pod: pattern.to_string(),
                    timeout,
                });
            }
            thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }

    /// Transfer `dirs` of a checkout concurrently into the same path in the pod
    fn transfer_dirs(
        &self,
        outcome: &mut PodOutcome,
        app: AppName,
        source: &Path,
        dirs: &[&str],
        log_file: &Path,
    ) {
        let pod = outcome.pod.clone();
        let pod_dir = source.display().to_string();
        let present: Vec<&str> = dirs
            .iter()
            .copied()
            .filter(|d| source.join(d).exists())
            .collect();

        let results: Vec<(String, KubesrcResult<()>)> = thread::scope(|scope| {
            let handles: Vec<_> = present
                .iter()
                .map(|dir| {
                    let pod = pod.as_str();
                    let pod_dir = pod_dir.as_str();
                    scope.spawn(move || {
                        let host_path = source.join(dir);
                        let result = self.transfer_one(pod, &host_path, pod_dir, log_file);
                        (format!("{app}/{dir}"), result)
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(&present)
                .map(|(handle, dir)| {
                    handle.join().unwrap_or_else(|_| {
                        (
                            format!("{app}/{dir}"),
                            Err(KubesrcError::TransferFailed {
                                pod: pod.clone(),
                                message: "transfer thread panicked".to_string(),
                                log_file: log_file.to_path_buf(),
                            }),
                        )
                    })
                })
                .collect()
        });

        for (item, result) in results {
            outcome.record(item, result);
        }
    }

    fn transfer_one(&self, pod: &str, host_path: &Path, pod_dir: &str, log_file: &Path) -> KubesrcResult<()> {
        if host_path.is_dir() {
            let target = host_path.display().to_string();
            self.cluster.exec(pod, &["mkdir", "-p", target.as_str()])?;
        }
        self.push(pod, host_path, pod_dir, TRANSFER_EXCLUDES, log_file)
    }

    fn push(
        &self,
        pod: &str,
        host_path: &Path,
        pod_dir: &str,
        excludes: &[&str],
        log_file: &Path,
    ) -> KubesrcResult<()> {
        let request = TransferRequest {
            pod,
            host_path,
            pod_dir,
            excludes,
            log_file,
        };
        self.transport.push(&request).map_err(|e| transfer_failed(pod, e))
    }

    /// Carry the pod's generated config and certificates into the synced
    /// release so the application keeps its identity.
    fn copy_continuity(&self, outcome: &mut PodOutcome, app: AppName, source: &Path, log_file: &Path) {
        let pod = outcome.pod.clone();
        let release_name = app.release_name();
        let etc = source.join(rel_sources_dir(app)).join("etc");
        let etc = etc.display().to_string();

        for item in CONTINUITY_ITEMS {
            let from = format!("/etc/{release_name}/{item}");
            let result = match self.cluster.file_exists(&pod, &from) {
                Ok(false) => continue,
                Ok(true) => self
                    .cluster
                    .exec(&pod, &["mkdir", "-p", etc.as_str()])
                    .and_then(|_| self.cluster.exec(&pod, &["cp", "-r", from.as_str(), etc.as_str()]))
                    .map(|_| ())
                    .map_err(KubesrcError::from),
                Err(e) => Err(e.into()),
            };
            if result.is_ok() {
                tracing::debug!(pod = %pod, from = %from, to = %etc, log = %log_file.display(), "copied");
            }
            outcome.record(format!("{app}/{item}"), result);
        }
    }

    /// Rebuild a node from pod labels and the recorded sources
    fn node_for(&self, info: &PodInfo, sources: &[(AppName, PathBuf)]) -> KubesrcResult<Node> {
        let service = service_of(&self.settings.release, &info.name);
        let role = info
            .component
            .as_deref()
            .and_then(ServiceRole::from_component)
            .unwrap_or_else(|| ServiceRole::from_service_name(&service));

        let apps = role
            .apps()
            .iter()
            .map(|&app| match sources.iter().find(|(a, _)| *a == app) {
                Some((_, path)) => Application::sourced(app, path),
                None => Application::packaged(app),
            })
            .collect();
        Ok(Node::new(pod_node(&info.name)?, service, apps, &self.deployment_dir))
    }

    /// Patch the panel's runtime config with the node's resolved settings and
    /// push it back to where the panel reads it.
    fn patch_panel(&self, pod: &str, node: &Node, log_file: &Path) -> KubesrcResult<()> {
        let panel = node.panel()?;
        fs::create_dir_all(node.rel_dir())?;
        let local = node.app_config_path();

        let pod_dir = match panel.release_path() {
            Some(release) => {
                let data = release.join("data");
                fs::copy(data.join(APP_CONFIG_FILE), &local)?;
                data.display().to_string()
            }
            None => {
                let dir = format!("/var/lib/{}", panel.name().release_name());
                self.cluster
                    .copy_from_pod(pod, &format!("{dir}/{APP_CONFIG_FILE}"), &local)?;
                dir
            }
        };

        let original = fs::read_to_string(&local)?;
        fs::write(&local, node.patch_app_config(&original)?)?;
        tracing::debug!(pod = %pod, to = %pod_dir, "pushing patched app.config");
        self.push(pod, &local, &pod_dir, &[], log_file)
    }

    fn touch_sentinel(&self, pod: &str) -> KubesrcResult<()> {
        self.cluster.exec(pod, &["touch", SENTINEL_FILE])?;
        Ok(())
    }

    /// Append the panel's path to the sentinel unless already listed
    fn append_sentinel(&self, pod: &str, path: &Path) -> KubesrcResult<()> {
        let line = shell_quote(&path.display().to_string());
        let script = format!(
            "grep -qxF {line} {SENTINEL_FILE} 2>/dev/null || echo {line} >> {SENTINEL_FILE}"
        );
        self.cluster.exec(pod, &["bash", "-c", script.as_str()])?;
        Ok(())
    }

    fn push_client(&self, pod: &str, dir: &Path) -> KubesrcResult<()> {
        // Trailing slash: copy the directory's contents, not the directory.
        let contents = PathBuf::from(format!("{}/", dir.display()));
        self.push(pod, &contents, CLIENT_BIN_PATH, &[], &self.log_file(pod))
    }
}

fn transfer_failed(pod: &str, e: TransferError) -> KubesrcError {
    match e {
        TransferError::Failed {
            program,
            status,
            log_file,
        } => KubesrcError::TransferFailed {
            pod: pod.to_string(),
            message: format!("{program} exited with {status}"),
            log_file,
        },
        other => KubesrcError::Transfer(other),
    }
}

/// Service part of a stateful-set pod name (`dev-onezone-0` → `onezone`)
pub fn service_of(release: &str, pod: &str) -> String {
    let trimmed = pod
        .strip_prefix(release)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(pod);
    match trimmed.rsplit_once('-') {
        Some((service, ordinal))
            if !ordinal.is_empty() && ordinal.chars().all(|c| c.is_ascii_digit()) =>
        {
            service.to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_is_pod_name_without_release_and_ordinal() {
        assert_eq!(service_of("dev", "dev-onezone-0"), "onezone");
        assert_eq!(service_of("dev", "dev-oneprovider-krakow-2"), "oneprovider-krakow");
        assert_eq!(service_of("other", "dev-onezone-0"), "dev-onezone");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("/h/o'z"), r"'/h/o'\''z'");
    }
}
