//! Content hash value object
//!
//! Used by the watch engine to tell a rewritten client binary apart from a
//! file that was merely touched.

use std::fmt;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

/// SHA-256 digest with the `sha256:` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Prefix for SHA-256 hashes
    pub const PREFIX: &'static str = "sha256:";

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{}{:x}", Self::PREFIX, Sha256::digest(bytes)))
    }

    /// Hash a file by streaming it through the hasher
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(Self(format!("{}{:x}", Self::PREFIX, hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Just the hex part without prefix
    pub fn hex(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
