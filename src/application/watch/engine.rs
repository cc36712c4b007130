//! Watch engine
//!
//! One recursive watcher per `(pod, app, subdir)` checkout directory and one
//! per client binary directory, all feeding a single channel. The dispatcher
//! batches events and hands each distinct key to the sync worker pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::batch::{drain_batch, ClientFilter, WatchMessage};
use super::event::{WatchEvent, WatchSettings};
use crate::application::sync::{JobKey, PodOutcome, SyncEngine, WorkerPool, SYNCED_DIRS};
use crate::domain::entities::CLIENT_APP_KEY;
use crate::domain::value_objects::{pod_matches, AppName};
use crate::error::{KubesrcError, KubesrcResult};

/// A watched host directory and the resync it triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub key: JobKey,
    /// Directory the watcher observes
    pub path: PathBuf,
    /// Checkout root, or the client binary directory
    pub source: PathBuf,
}

impl WatchTarget {
    fn is_client(&self) -> bool {
        self.key.app == Some(AppName::Oneclient)
    }
}

/// Counters returned when the dispatcher stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchSummary {
    pub batches: usize,
    pub events: usize,
    pub scheduled: usize,
}

pub struct WatchEngine {
    sync: SyncEngine,
    settings: WatchSettings,
}

impl WatchEngine {
    pub fn new(sync: SyncEngine, settings: WatchSettings) -> Self {
        Self { sync, settings }
    }

    /// Every directory to watch, derived from the deployment state
    pub fn targets(&self) -> KubesrcResult<Vec<WatchTarget>> {
        let state = self.sync.load_state()?;
        let filter = self.settings.pod_filter.as_deref();
        let selected = |name: &str| filter.map_or(true, |f| pod_matches(f, name));
        let mut targets = Vec::new();

        for pod in state.sources.keys().filter(|p| selected(p)) {
            for (app, source) in state.pod_sources(pod) {
                for dir in SYNCED_DIRS {
                    let path = source.join(dir);
                    if path.is_dir() {
                        targets.push(WatchTarget {
                            key: JobKey::app(pod.as_str(), app).with_dir(dir),
                            path,
                            source: source.clone(),
                        });
                    }
                }
            }
        }

        if !state.oc_deployments.is_empty() {
            let pods = self.sync.cluster().list_pods()?;
            for (pattern, apps) in &state.oc_deployments {
                let Some(dir) = apps.get(CLIENT_APP_KEY) else {
                    continue;
                };
                let matching = pods
                    .iter()
                    .filter(|p| pod_matches(pattern, &p.name) && selected(&p.name));
                for pod in matching {
                    targets.push(WatchTarget {
                        key: JobKey::app(pod.name.as_str(), AppName::Oneclient),
                        path: dir.clone(),
                        source: dir.clone(),
                    });
                }
            }
        }

        if let (Some(pattern), true) = (filter, targets.is_empty()) {
            return Err(KubesrcError::NoMatchingPods {
                pattern: pattern.to_string(),
            });
        }
        Ok(targets)
    }

    /// Start watching (blocking) until `running` is cleared
    pub fn start<F>(&self, running: Arc<AtomicBool>, on_event: F) -> KubesrcResult<WatchSummary>
    where
        F: FnMut(WatchEvent),
    {
        let targets = self.targets()?;
        let (tx, rx) = mpsc::channel();
        let mut watchers = Vec::with_capacity(targets.len());
        for target in &targets {
            watchers.push(watch_target(target, tx.clone())?);
        }
        drop(tx);

        let summary = self.dispatch(&targets, &rx, &running, on_event);
        drop(watchers);
        Ok(summary)
    }

    /// Batch messages from `rx` into resyncs until `running` is cleared or
    /// every sender is gone.
    pub fn dispatch<F>(
        &self,
        targets: &[WatchTarget],
        rx: &Receiver<WatchMessage>,
        running: &AtomicBool,
        mut on_event: F,
    ) -> WatchSummary
    where
        F: FnMut(WatchEvent),
    {
        on_event(WatchEvent::WatchStarted {
            watching: targets.iter().map(|t| t.path.display().to_string()).collect(),
        });

        let by_key: HashMap<&JobKey, &WatchTarget> = targets.iter().map(|t| (&t.key, t)).collect();
        let mut clients = ClientFilter::default();
        for target in targets.iter().filter(|t| t.is_client()) {
            clients.track(target.key.clone(), &target.source);
        }

        let pool = WorkerPool::new(self.sync.settings().workers);
        let (done_tx, done_rx) = mpsc::channel::<PodOutcome>();
        let mut summary = WatchSummary::default();

        if self.settings.initial_sync {
            for target in targets {
                if self.schedule(&pool, target, &done_tx) {
                    summary.scheduled += 1;
                }
            }
        }

        while running.load(Ordering::SeqCst) {
            match rx.recv_timeout(self.settings.poll_interval) {
                Ok(first) => {
                    let batch = drain_batch(first, rx, self.settings.batch_size);
                    summary.batches += 1;
                    summary.events += batch.events;
                    on_event(WatchEvent::ChangesDetected {
                        events: batch.events,
                        keys: batch.keys().len(),
                    });

                    for key in batch.keys() {
                        let Some(target) = by_key.get(key) else {
                            continue;
                        };
                        if clients.is_client(key)
                            && !clients.binary_changed(key, &target.source, batch.paths(key))
                        {
                            continue;
                        }
                        if self.schedule(&pool, target, &done_tx) {
                            summary.scheduled += 1;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            for outcome in done_rx.try_iter() {
                on_event(WatchEvent::from_outcome(outcome));
            }
        }

        drop(done_tx);
        pool.join();
        for outcome in done_rx {
            on_event(WatchEvent::from_outcome(outcome));
        }
        on_event(WatchEvent::Shutdown);
        summary
    }

    fn schedule(&self, pool: &WorkerPool, target: &WatchTarget, done: &Sender<PodOutcome>) -> bool {
        let sync = self.sync.clone();
        let target_owned = target.clone();
        let done = done.clone();
        pool.submit(target.key.clone(), move || {
            let outcome = resync(&sync, &target_owned);
            let _ = done.send(outcome);
        })
    }
}

fn resync(sync: &SyncEngine, target: &WatchTarget) -> PodOutcome {
    let key = &target.key;
    match (key.app, key.dir.as_deref()) {
        (Some(AppName::Oneclient), _) => sync.resync_client(&key.pod, &target.source),
        (Some(app), Some(dir)) => sync.resync_dir(&key.pod, app, &target.source, dir),
        _ => PodOutcome::abandoned(key.pod.as_str(), "watch key without application"),
    }
}

fn watch_target(target: &WatchTarget, tx: Sender<WatchMessage>) -> KubesrcResult<RecommendedWatcher> {
    let key = target.key.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) if event.kind.is_access() => {}
            Ok(event) => {
                let _ = tx.send(WatchMessage {
                    key: key.clone(),
                    paths: event.paths,
                });
            }
            Err(e) => tracing::warn!(error = %e, "watch backend error"),
        },
        notify::Config::default(),
    )?;

    let mode = if target.is_client() {
        RecursiveMode::NonRecursive
    } else {
        RecursiveMode::Recursive
    };
    watcher.watch(&target.path, mode)?;
    tracing::debug!(pod = %target.key.pod, path = %target.path.display(), "watching");
    Ok(watcher)
}
