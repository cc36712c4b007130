//! kubectl-backed Cluster API
//!
//! Every call shells out to `kubectl --namespace <ns> ...`. Pod listings are
//! read from `get pod -o json`.

use std::path::Path;

use serde::Deserialize;

use super::command::{run, run_checked};
use crate::domain::ports::{ClusterApi, ClusterError, PodInfo, PodPhase};

pub struct KubectlCluster {
    namespace: String,
    program: String,
}

impl KubectlCluster {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            program: "kubectl".to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        ["--namespace", self.namespace.as_str()]
            .iter()
            .chain(rest)
            .map(|s| s.to_string())
            .collect()
    }

    fn exec_args(&self, pod: &str, argv: &[&str]) -> Vec<String> {
        let mut args = self.args(&["exec", pod, "--"]);
        args.extend(argv.iter().map(|s| s.to_string()));
        args
    }
}

impl ClusterApi for KubectlCluster {
    fn list_pods(&self) -> Result<Vec<PodInfo>, ClusterError> {
        let stdout = run_checked("", &self.program, &self.args(&["get", "pod", "-o", "json"]))?;
        parse_pod_list(&stdout)
    }

    fn exec(&self, pod: &str, argv: &[&str]) -> Result<String, ClusterError> {
        run_checked(pod, &self.program, &self.exec_args(pod, argv))
    }

    fn file_exists(&self, pod: &str, path: &str) -> Result<bool, ClusterError> {
        let output = run(&self.program, &self.exec_args(pod, &["test", "-e", path]))?;
        Ok(output.status.success())
    }

    fn copy_from_pod(&self, pod: &str, pod_path: &str, host_path: &Path) -> Result<(), ClusterError> {
        let source = format!("{pod}:{pod_path}");
        let destination = host_path.display().to_string();
        run_checked(pod, &self.program, &self.args(&["cp", &source, &destination]))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
    #[serde(default)]
    labels: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    ready: bool,
}

/// Parse the output of `kubectl get pod -o json`
pub fn parse_pod_list(json: &str) -> Result<Vec<PodInfo>, ClusterError> {
    let list: PodList = serde_json::from_str(json).map_err(|e| ClusterError::InvalidResponse {
        message: e.to_string(),
    })?;
    Ok(list
        .items
        .into_iter()
        .map(|item| {
            let statuses = &item.status.container_statuses;
            PodInfo {
                phase: PodPhase::parse(item.status.phase.as_deref().unwrap_or_default()),
                ready: !statuses.is_empty() && statuses.iter().all(|c| c.ready),
                component: item.metadata.labels.get("component").cloned(),
                chart: item.metadata.labels.get("chart").cloned(),
                name: item.metadata.name,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PODS: &str = r#"{
      "items": [
        {
          "metadata": {"name": "dev-onezone-0", "labels": {"component": "onezone", "chart": "onezone"}},
          "status": {"phase": "Running", "containerStatuses": [{"ready": true}]}
        },
        {
          "metadata": {"name": "dev-oneprovider-krakow-0", "labels": {"component": "oneprovider"}},
          "status": {"phase": "Pending"}
        },
        {
          "metadata": {"name": "dev-job-xyz"},
          "status": {"phase": "Succeeded", "containerStatuses": [{"ready": false}]}
        }
      ]
    }"#;

    #[test]
    fn parses_phase_labels_and_readiness() {
        let pods = parse_pod_list(PODS).unwrap();
        assert_eq!(pods.len(), 3);
        assert!(pods[0].is_ready());
        assert_eq!(pods[0].component.as_deref(), Some("onezone"));
        assert_eq!(pods[1].phase, PodPhase::Pending);
        assert!(!pods[1].ready);
        assert_eq!(pods[1].chart, None);
        assert_eq!(pods[2].component, None);
    }

    #[test]
    fn garbage_is_an_invalid_response() {
        assert!(matches!(
            parse_pod_list("not json"),
            Err(ClusterError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn commands_are_namespaced() {
        let cluster = KubectlCluster::new("ns1");
        assert_eq!(
            cluster.exec_args("p", &["test", "-e", "/x"]),
            vec!["--namespace", "ns1", "exec", "p", "--", "test", "-e", "/x"]
        );
    }
}
