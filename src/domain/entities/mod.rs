//! Domain Entities
//!
//! - `Application` - one runtime on a node, packaged or sourced
//! - `Node` - a cluster member and its applications
//! - `Service` - a role family instance owning nodes and mount prefixes
//! - `Scenario` - the values documents the resolver reads
//! - `DeploymentState` - the persisted deployment record

mod application;
mod deployment_state;
mod node;
mod scenario;
mod service;

pub use application::{
    rel_sources_dir, AppSettings, Application, CommandSettings, FileSettings, WebSettings,
};
pub use deployment_state::{DeploymentState, SourceMap, CLIENT_APP_KEY};
pub use node::{Node, APP_CONFIG_FILE, CONFIG_ROOT, OVERLAY_CONFIG_FILE};
pub use scenario::{
    ClusterConfig, DeployFromSources, NodeSources, Scenario, ServiceOverride, ServiceSources,
    ServiceValues, SourceEntry, SourcesOverride, UserOverrides,
};
pub use service::{relative_to_root, PathPrefixes, Service};
