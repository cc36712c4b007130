//! SourceLocator port
//!
//! Finds the host checkout holding a compiled release of an application.

use std::path::PathBuf;

use crate::domain::value_objects::AppName;
use crate::error::KubesrcResult;

pub trait SourceLocator: Send + Sync {
    /// Absolute checkout path of `app`; fails with every path tried
    fn locate(&self, app: AppName) -> KubesrcResult<PathBuf>;

    /// Directory holding the thin-client binary. `build` (`release`,
    /// `debug`) is tried before the default builds.
    fn locate_client(&self, build: Option<&str>) -> KubesrcResult<PathBuf>;
}
