//! Filesystem Source Locator
//!
//! Looks for application checkouts next to the working directory: under the
//! directory itself, its parent and its grandparent, trying every directory
//! name the application is known by.

use std::path::{Component, Path, PathBuf};

use crate::domain::entities::rel_sources_dir;
use crate::domain::ports::SourceLocator;
use crate::domain::value_objects::AppName;
use crate::error::{KubesrcError, KubesrcResult};

/// Name of the thin-client binary inside a build directory
pub const CLIENT_BINARY: &str = "oneclient";

pub struct FsSourceLocator {
    search_roots: Vec<PathBuf>,
    client_builds: Vec<String>,
}

impl FsSourceLocator {
    /// Search `cwd`, `cwd/..` and `cwd/../..`
    pub fn new(cwd: &Path) -> Self {
        Self {
            search_roots: vec![cwd.to_path_buf(), cwd.join(".."), cwd.join("..").join("..")],
            client_builds: vec!["release".to_string(), "debug".to_string()],
        }
    }

    /// Build directories tried for the client, in order
    pub fn with_client_builds(mut self, builds: Vec<String>) -> Self {
        self.client_builds = builds;
        self
    }

    fn candidates(&self, app: AppName) -> Vec<PathBuf> {
        self.search_roots
            .iter()
            .flat_map(|root| app.checkout_dirs().iter().map(move |dir| root.join(dir)))
            .collect()
    }

    fn find_checkout(&self, app: AppName) -> KubesrcResult<PathBuf> {
        let candidates = self.candidates(app);
        match candidates.iter().find(|p| p.is_dir()) {
            Some(found) => Ok(normalize(found)),
            None => Err(KubesrcError::Locate {
                app: app.to_string(),
                tried: candidates,
            }),
        }
    }
}

/// Resolve `.` and `..` lexically. Symlinks are kept so that paths under a
/// symlinked home directory stay under it.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

impl SourceLocator for FsSourceLocator {
    fn locate(&self, app: AppName) -> KubesrcResult<PathBuf> {
        let location = self.find_checkout(app)?;
        let release = location.join(rel_sources_dir(app));
        if !release.is_dir() {
            return Err(KubesrcError::Locate {
                app: app.to_string(),
                tried: vec![release],
            });
        }
        Ok(location)
    }

    fn locate_client(&self, build: Option<&str>) -> KubesrcResult<PathBuf> {
        let location = self.find_checkout(AppName::Oneclient)?;
        let builds: Vec<PathBuf> = build
            .into_iter()
            .chain(self.client_builds.iter().map(String::as_str).filter(|b| Some(*b) != build))
            .map(|b| location.join(b))
            .collect();
        builds
            .iter()
            .find(|dir| dir.join(CLIENT_BINARY).is_file())
            .cloned()
            .ok_or_else(|| KubesrcError::Locate {
                app: AppName::Oneclient.to_string(),
                tried: builds.iter().map(|b| b.join(CLIENT_BINARY)).collect(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_checkout_in_parent_under_alternate_name() {
        let dir = tempdir().unwrap();
        let checkout = dir.path().join("oz_worker");
        fs::create_dir_all(checkout.join("_build/default/rel/oz_worker")).unwrap();
        let cwd = dir.path().join("env");
        fs::create_dir_all(&cwd).unwrap();

        let located = FsSourceLocator::new(&cwd).locate(AppName::OzWorker).unwrap();
        assert_eq!(located, checkout);
    }

    #[test]
    fn missing_checkout_lists_every_candidate() {
        let dir = tempdir().unwrap();
        let err = FsSourceLocator::new(dir.path()).locate(AppName::OzPanel).unwrap_err();
        let KubesrcError::Locate { tried, .. } = err else {
            panic!("expected a locate error");
        };
        assert_eq!(tried.len(), 9);
        assert!(tried[2].ends_with("onepanel"));
    }

    #[test]
    fn checkout_without_release_is_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cluster-manager")).unwrap();
        let err = FsSourceLocator::new(dir.path())
            .locate(AppName::ClusterManager)
            .unwrap_err();
        let KubesrcError::Locate { tried, .. } = err else {
            panic!("expected a locate error");
        };
        assert_eq!(tried.len(), 1);
        assert!(tried[0].ends_with("_build/default/rel/cluster_manager"));
    }

    #[test]
    fn client_prefers_release_build() {
        let dir = tempdir().unwrap();
        for build in ["release", "debug"] {
            let bin = dir.path().join("oneclient").join(build);
            fs::create_dir_all(&bin).unwrap();
            fs::write(bin.join(CLIENT_BINARY), b"").unwrap();
        }
        let located = FsSourceLocator::new(dir.path()).locate_client(None).unwrap();
        assert!(located.ends_with("oneclient/release"));

        let debug_first = FsSourceLocator::new(dir.path())
            .with_client_builds(vec!["debug".to_string()])
            .locate_client(None)
            .unwrap();
        assert!(debug_first.ends_with("oneclient/debug"));
    }

    #[test]
    fn requested_client_build_is_tried_first() {
        let dir = tempdir().unwrap();
        for build in ["release", "debug"] {
            let bin = dir.path().join("oneclient").join(build);
            fs::create_dir_all(&bin).unwrap();
            fs::write(bin.join(CLIENT_BINARY), b"").unwrap();
        }
        let located = FsSourceLocator::new(dir.path())
            .locate_client(Some("debug"))
            .unwrap();
        assert!(located.ends_with("oneclient/debug"));
    }

    #[test]
    fn requested_client_build_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("oneclient").join("release");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(CLIENT_BINARY), b"").unwrap();

        let located = FsSourceLocator::new(dir.path())
            .locate_client(Some("debug"))
            .unwrap();
        assert!(located.ends_with("oneclient/release"));
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(normalize(Path::new("/h/work/../op-worker")), PathBuf::from("/h/op-worker"));
        assert_eq!(normalize(Path::new("/h/./a/b/../../c")), PathBuf::from("/h/c"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_checkout_is_not_resolved() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(real.join("oz-worker/_build/default/rel/oz_worker")).unwrap();
        let home = dir.path().join("home");
        std::os::unix::fs::symlink(&real, &home).unwrap();
        let cwd = home.join("env");
        fs::create_dir_all(&cwd).unwrap();

        let located = FsSourceLocator::new(&cwd).locate(AppName::OzWorker).unwrap();
        assert_eq!(located, home.join("oz-worker"));
    }
}
