//! Node name translation
//!
//! User-facing node names are 1-indexed (`node-1`, `node-2`, ...) while the
//! cluster ordinals are 0-indexed (`n0`, `n1`, ...). Every component that
//! maps between the two goes through this module.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KubesrcError, KubesrcResult};

const USER_PREFIX: &str = "node-";
const ORDINAL_PREFIX: char = 'n';

/// `node-N` → `N - 1`
pub fn parse_node_num(node_name: &str) -> KubesrcResult<usize> {
    let digits = node_name
        .strip_prefix(USER_PREFIX)
        .ok_or_else(|| invalid(node_name, "expected the form 'node-N'"))?;
    let num = parse_digits(digits)
        .ok_or_else(|| invalid(node_name, "node number is not a positive integer"))?;
    if num == 0 {
        return Err(invalid(node_name, "node numbers start at 1"));
    }
    Ok(num - 1)
}

/// `node-N` → `n{N-1}`
pub fn parse_node_name(node_name: &str) -> KubesrcResult<String> {
    Ok(NodeName::from_ordinal(parse_node_num(node_name)?).to_string())
}

/// ASCII digits only; `usize::from_str` also takes a leading `+`
fn parse_digits(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn invalid(name: &str, reason: &str) -> KubesrcError {
    KubesrcError::InvalidNodeName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Cluster-side node name (`n0`, `n1`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeName(usize);

impl NodeName {
    /// The node every unconfigured node is cloned from
    pub const BASELINE: NodeName = NodeName(0);

    pub fn from_ordinal(ordinal: usize) -> Self {
        Self(ordinal)
    }

    /// Parse either form: `n2` or `node-3`.
    pub fn parse(s: &str) -> KubesrcResult<Self> {
        if s.starts_with(USER_PREFIX) {
            return parse_node_num(s).map(Self);
        }
        let digits = s
            .strip_prefix(ORDINAL_PREFIX)
            .ok_or_else(|| invalid(s, "expected the form 'nK' or 'node-N'"))?;
        parse_digits(digits)
            .map(Self)
            .ok_or_else(|| invalid(s, "node ordinal is not a non-negative integer"))
    }

    pub fn ordinal(&self) -> usize {
        self.0
    }

    /// User-facing alias (`n0` → `node-1`)
    pub fn alias(&self) -> String {
        format!("{}{}", USER_PREFIX, self.0 + 1)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ORDINAL_PREFIX, self.0)
    }
}

impl TryFrom<String> for NodeName {
    type Error = KubesrcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeName> for String {
    fn from(value: NodeName) -> Self {
        value.to_string()
    }
}
