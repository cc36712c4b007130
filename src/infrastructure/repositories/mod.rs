//! Repository Implementations
//!
//! Concrete implementations of domain repository ports.

mod deployment_state;

pub use deployment_state::{YamlStateStore, DEPLOYMENT_DATA_FILE};
