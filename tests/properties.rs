//! Property tests for kubesrc.
//!
//! Run with: `cargo test --test properties`

#[path = "properties/node_names.rs"]
mod node_names;

#[path = "properties/pod_names.rs"]
mod pod_names;
