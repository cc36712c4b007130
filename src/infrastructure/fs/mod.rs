//! Host filesystem adapters

mod deployments;
mod locator;

pub use deployments::{logs_dir, DeploymentsDir, LOGS_DIR};
pub use locator::{FsSourceLocator, CLIENT_BINARY};
