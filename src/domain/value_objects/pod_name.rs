//! Pod naming.
//!
//! Stateful-set pods are named `<release>-<service>-<ordinal>`; the ordinal
//! is the same 0-indexed number as the `nK` node name.

use super::node_name::NodeName;
use crate::error::{KubesrcError, KubesrcResult};

/// Pod name for a node of a service
pub fn gen_pod_name(release: &str, service: &str, node: NodeName) -> String {
    format!("{}-{}-{}", release, service, node.ordinal())
}

/// Substring identifying every client pod of a service.
///
/// Client pods get a generated suffix from the cluster, so the full name is
/// not known until they exist.
pub fn client_pod_substring(release: &str, service: &str) -> String {
    format!("{}-{}", release, service)
}

/// Node of a stateful-set pod (`dev-onezone-2` → `n2`)
pub fn pod_node(pod_name: &str) -> KubesrcResult<NodeName> {
    let last = pod_name.rsplit('-').next().unwrap_or(pod_name);
    last.parse()
        .map(NodeName::from_ordinal)
        .map_err(|_| KubesrcError::InvalidNodeName {
            name: pod_name.to_string(),
            reason: "pod name does not end with a node ordinal".to_string(),
        })
}

/// Pod matching where every `-` in the pattern is a wildcard.
///
/// `z-1` matches `dev-onezone-node-1-0`: the dash-separated pieces of the
/// pattern must appear in the name in order.
pub fn pod_matches(pattern: &str, pod_name: &str) -> bool {
    let mut rest = pod_name;
    for piece in pattern.split('-').filter(|p| !p.is_empty()) {
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    true
}
