//! Configuration module for kubesrc
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (KUBESRC_*)
//! 3. User config (`$KUBESRC_CONFIG` or `~/.kubesrc/config.toml`)
//! 4. Built-in defaults (lowest priority)

mod loader;
#[cfg(test)]
mod tests;
mod types;

pub use crate::domain::value_objects::ConfigWarning;

pub use loader::{config_path, load_or_default, load_with_warnings, with_env_overrides, with_overrides_from};
pub use types::{ClusterConfig, Config, DeploymentsConfig, HostConfig, SyncConfig, WatchConfig};
