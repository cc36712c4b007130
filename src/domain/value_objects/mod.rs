//! Domain Value Objects
//!
//! Immutable value types that represent domain concepts.

mod app_kind;
mod config_warning;
mod hash;
mod node_name;
mod pod_name;

pub use app_kind::{service_alias, AppName, AppType, ServiceRole, UnknownApp};
pub use config_warning::ConfigWarning;
pub use hash::ContentHash;
pub use node_name::{parse_node_name, parse_node_num, NodeName};
pub use pod_name::{client_pod_substring, gen_pod_name, pod_matches, pod_node};
