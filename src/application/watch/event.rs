//! Watch event types and options

use std::time::Duration;

use crate::application::sync::PodOutcome;
use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    /// Most events drained into one batch
    pub batch_size: usize,
    /// How long the dispatcher waits for an event before re-checking the
    /// running flag
    pub poll_interval: Duration,
    /// Resync every watched key once at start
    pub initial_sync: bool,
    /// Only watch pods matching this pattern
    pub pod_filter: Option<String>,
}

impl WatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.watch.batch_size,
            poll_interval: config.watch.poll_interval(),
            initial_sync: config.watch.initial_sync,
            pod_filter: None,
        }
    }
}

/// Watch event types for NDJSON output
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Watch started
    WatchStarted { watching: Vec<String> },
    /// A batch of filesystem events was drained
    ChangesDetected { events: usize, keys: usize },
    /// Resync of one key completed
    SyncComplete {
        pod: String,
        synced: Vec<String>,
    },
    /// Resync of one key had failures
    SyncFailed {
        pod: String,
        errors: Vec<String>,
    },
    /// Watch stopped
    Shutdown,
}

impl WatchEvent {
    pub fn from_outcome(outcome: PodOutcome) -> Self {
        if let Some(reason) = outcome.abandoned {
            return WatchEvent::SyncFailed {
                pod: outcome.pod,
                errors: vec![reason],
            };
        }
        if outcome.failures.is_empty() {
            WatchEvent::SyncComplete {
                pod: outcome.pod,
                synced: outcome.synced,
            }
        } else {
            WatchEvent::SyncFailed {
                pod: outcome.pod,
                errors: outcome.failures,
            }
        }
    }

    /// Convert to JSON string with "command": "watch" field included
    pub fn to_json(&self) -> String {
        let mut value =
            serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"event": "error"}));
        if let Some(obj) = value.as_object_mut() {
            obj.insert("command".to_string(), serde_json::json!("watch"));
        }
        serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string())
    }
}
