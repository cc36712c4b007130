//! Cluster adapters backed by the `kubectl` and `helm` CLIs

mod command;
mod helm;
mod kubectl;

pub use helm::HelmReleases;
pub use kubectl::{parse_pod_list, KubectlCluster};
