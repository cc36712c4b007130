//! helm-backed release orchestration

use std::path::Path;

use super::command::run_checked;
use crate::domain::ports::{ClusterError, ReleaseManager};

pub struct HelmReleases {
    namespace: String,
    program: String,
}

impl HelmReleases {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            program: "helm".to_string(),
        }
    }

    fn install_args(&self, release: &str, chart: &str, values_files: &[&Path]) -> Vec<String> {
        let mut args = vec![
            "--namespace".to_string(),
            self.namespace.clone(),
            "upgrade".to_string(),
            "--install".to_string(),
            release.to_string(),
            chart.to_string(),
        ];
        for file in values_files {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        args
    }
}

impl ReleaseManager for HelmReleases {
    fn install(&self, release: &str, chart: &str, values_files: &[&Path]) -> Result<(), ClusterError> {
        tracing::info!(release = %release, chart = %chart, "installing release");
        run_checked("", &self.program, &self.install_args(release, chart, values_files))?;
        Ok(())
    }

    fn uninstall(&self, release: &str) -> Result<(), ClusterError> {
        tracing::info!(release = %release, "removing release");
        let args = vec![
            "--namespace".to_string(),
            self.namespace.clone(),
            "uninstall".to_string(),
            release.to_string(),
        ];
        run_checked("", &self.program, &args)?;
        Ok(())
    }
}
