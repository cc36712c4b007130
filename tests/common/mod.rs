//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Host checkout with a built release (`_build/default/rel/<release>`) and
/// a `src/` directory
pub fn checkout(root: &Path, dir_name: &str, release_name: &str) -> PathBuf {
    let path = root.join(dir_name);
    fs::create_dir_all(path.join("_build/default/rel").join(release_name)).unwrap();
    fs::create_dir_all(path.join("src")).unwrap();
    path
}

pub fn write(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

pub const TWO_PROVIDER_SCENARIO: &str = r#"
onedata-2p:
  onezone:
    image: onedata/onezone:develop
    deployFromSources:
      enabled: false
      nodes:
        n0:
          sources:
            - name: oz-worker
            - name: oz-panel
  oneprovider-krakow:
    deployFromSources:
      enabled: false
      nodes:
        n0:
          sources:
            - name: op-worker
  oneprovider-paris:
    deployFromSources:
      enabled: false
"#;
