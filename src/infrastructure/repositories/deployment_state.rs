//! YAML Deployment State Repository
//!
//! Persists the deployment record at `<deployment>/deployment_data.yml`.
//!
//! Mutations hold an in-process mutex and an exclusive file lock on
//! `deployment_data.lock` for the whole read-merge-write sequence. The file
//! is replaced atomically, so readers never observe a missing or partial
//! record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use serde_yaml_ng::{Mapping, Value};
use tempfile::NamedTempFile;

use crate::domain::entities::DeploymentState;
use crate::domain::ports::{DeploymentStateStore, StateError};

pub const DEPLOYMENT_DATA_FILE: &str = "deployment_data.yml";

pub struct YamlStateStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl YamlStateStore {
    /// Store inside a deployment directory
    pub fn in_deployment(deployment_dir: &Path) -> Self {
        Self::with_path(deployment_dir.join(DEPLOYMENT_DATA_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn access(&self, source: std::io::Error) -> StateError {
        StateError::Access {
            path: self.path.clone(),
            source,
        }
    }

    fn load_raw(&self) -> Result<Mapping, StateError> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.access(e))?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }
        match serde_yaml_ng::from_str(&content) {
            Ok(Value::Mapping(mapping)) => Ok(mapping),
            Ok(Value::Null) => Ok(Mapping::new()),
            Ok(_) => Err(StateError::Corrupted {
                path: self.path.clone(),
                message: "top level is not a mapping".to_string(),
            }),
            Err(e) => Err(StateError::Corrupted {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn save_raw(&self, record: &Mapping) -> Result<(), StateError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| self.access(e))?;

        let content = serde_yaml_ng::to_string(record).map_err(|e| StateError::Serialization {
            message: e.to_string(),
        })?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| self.access(e))?;
        tmp.write_all(content.as_bytes()).map_err(|e| self.access(e))?;
        tmp.persist(&self.path).map_err(|e| self.access(e.error))?;
        Ok(())
    }

    /// Run `f` on the raw record while holding both locks, then save it
    fn mutate<F>(&self, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut Mapping) -> Result<(), StateError>,
    {
        let _guard = self.lock_in_process();

        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.access(e))?;
        }
        let lock_file = fs::File::create(&lock_path).map_err(|e| self.access(e))?;
        lock_file.lock_exclusive().map_err(|e| self.access(e))?;

        let result = self.load_raw().and_then(|mut record| {
            f(&mut record)?;
            self.save_raw(&record)
        });

        let _ = lock_file.unlock();
        result
    }

    /// Typed read-modify-write on top of [`mutate`](Self::mutate)
    fn update<F>(&self, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut DeploymentState),
    {
        self.mutate(|record| {
            let mut state = self.decode(Value::Mapping(std::mem::take(record)))?;
            f(&mut state);
            *record = encode(&state)?;
            Ok(())
        })
    }

    fn decode(&self, value: Value) -> Result<DeploymentState, StateError> {
        serde_yaml_ng::from_value(value).map_err(|e| StateError::Corrupted {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn lock_in_process(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn encode(state: &DeploymentState) -> Result<Mapping, StateError> {
    match serde_yaml_ng::to_value(state) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(_) => Ok(Mapping::new()),
        Err(e) => Err(StateError::Serialization {
            message: e.to_string(),
        }),
    }
}

impl DeploymentStateStore for YamlStateStore {
    fn get(&self, default: DeploymentState) -> Result<DeploymentState, StateError> {
        if !self.path.exists() {
            return Ok(default);
        }
        self.decode(Value::Mapping(self.load_raw()?))
    }

    fn put(&self, patch: Mapping) -> Result<(), StateError> {
        self.mutate(|record| {
            for (key, value) in patch {
                record.insert(key, value);
            }
            Ok(())
        })
    }

    fn add_source(&self, pod: &str, app: &str, path: &Path) -> Result<(), StateError> {
        tracing::debug!(pod = %pod, app = %app, path = %path.display(), "recording source");
        self.update(|state| state.insert_source(pod, app, path))
    }

    fn add_oneclient_deployment(&self, pod_substring: &str, path: &Path) -> Result<(), StateError> {
        tracing::debug!(pod = %pod_substring, path = %path.display(), "recording client deployment");
        self.update(|state| state.insert_client_deployment(pod_substring, path))
    }

    fn add_release(&self, name: &str) -> Result<(), StateError> {
        self.update(|state| state.insert_release(name))
    }

    fn remove_releases(&self, names: &[String]) -> Result<(), StateError> {
        self.update(|state| state.releases.retain(|r| !names.contains(r)))
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn clear(&self) -> Result<(), StateError> {
        let _guard = self.lock_in_process();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.access(e)),
        }
        let _ = fs::remove_file(self.lock_path());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}
