//! Change batching
//!
//! File watchers fire many events for one logical change (an editor save, a
//! rebuild touching hundreds of files). The dispatcher drains the channel in
//! batches and schedules at most one resync per key per batch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use crate::application::sync::JobKey;
use crate::domain::value_objects::ContentHash;
use crate::infrastructure::fs::CLIENT_BINARY;

/// One filesystem notification, tagged with the watcher it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchMessage {
    pub key: JobKey,
    pub paths: Vec<PathBuf>,
}

/// Distinct keys of a drained batch, in first-seen order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    pub events: usize,
    keys: Vec<JobKey>,
    paths: HashMap<JobKey, Vec<PathBuf>>,
}

impl Batch {
    fn add(&mut self, message: WatchMessage) {
        self.events += 1;
        if !self.paths.contains_key(&message.key) {
            self.keys.push(message.key.clone());
        }
        self.paths.entry(message.key).or_default().extend(message.paths);
    }

    pub fn keys(&self) -> &[JobKey] {
        &self.keys
    }

    pub fn paths(&self, key: &JobKey) -> &[PathBuf] {
        self.paths.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// `first` plus up to `batch_size` further messages already waiting
pub fn drain_batch(first: WatchMessage, rx: &Receiver<WatchMessage>, batch_size: usize) -> Batch {
    let mut batch = Batch::default();
    batch.add(first);
    while batch.events <= batch_size {
        match rx.try_recv() {
            Ok(message) => batch.add(message),
            Err(_) => break,
        }
    }
    batch
}

/// Lets a client resync through only when the binary's content changed
#[derive(Debug, Default)]
pub struct ClientFilter {
    hashes: HashMap<JobKey, ContentHash>,
    clients: HashSet<JobKey>,
}

impl ClientFilter {
    /// Register a client key and remember the binary's current content
    pub fn track(&mut self, key: JobKey, dir: &Path) {
        if let Ok(hash) = ContentHash::from_file(&dir.join(CLIENT_BINARY)) {
            self.hashes.insert(key.clone(), hash);
        }
        self.clients.insert(key);
    }

    pub fn is_client(&self, key: &JobKey) -> bool {
        self.clients.contains(key)
    }

    /// Whether `paths` rewrote the client binary under `dir`
    pub fn binary_changed(&mut self, key: &JobKey, dir: &Path, paths: &[PathBuf]) -> bool {
        let touches_binary = paths
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == CLIENT_BINARY));
        if !touches_binary {
            return false;
        }
        let hash = match ContentHash::from_file(&dir.join(CLIENT_BINARY)) {
            Ok(hash) => hash,
            Err(e) => {
                // Usually still being written; the closing event retriggers.
                tracing::debug!(error = %e, "client binary unreadable");
                return false;
            }
        };
        if self.hashes.get(key) == Some(&hash) {
            return false;
        }
        self.hashes.insert(key.clone(), hash);
        true
    }
}
