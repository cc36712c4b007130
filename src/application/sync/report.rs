//! Sync outcomes

use serde::Serialize;

/// What happened to one pod during a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PodOutcome {
    pub pod: String,
    /// Items transferred or applied, e.g. `oz-worker/src` or `sentinel`
    pub synced: Vec<String>,
    /// Items that failed, with the reason
    pub failures: Vec<String>,
    /// Set when the pod was skipped entirely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<String>,
}

impl PodOutcome {
    pub fn new(pod: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            ..Self::default()
        }
    }

    pub fn abandoned(pod: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            abandoned: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.abandoned.is_none() && self.failures.is_empty()
    }

    pub(crate) fn record<E: std::fmt::Display>(&mut self, item: impl Into<String>, result: Result<(), E>) {
        let item = item.into();
        match result {
            Ok(()) => self.synced.push(item),
            Err(e) => {
                tracing::warn!(pod = %self.pod, item = %item, error = %e, "sync step failed");
                self.failures.push(format!("{item}: {e}"));
            }
        }
    }
}

/// Result of a full sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pods: Vec<PodOutcome>,
}

impl SyncReport {
    pub fn push(&mut self, outcome: PodOutcome) {
        self.pods.push(outcome);
    }

    pub fn abandoned(&self) -> impl Iterator<Item = &PodOutcome> {
        self.pods.iter().filter(|p| p.is_abandoned())
    }

    pub fn synced(&self) -> impl Iterator<Item = &PodOutcome> {
        self.pods.iter().filter(|p| p.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PodOutcome> {
        self.pods
            .iter()
            .filter(|p| !p.is_abandoned() && !p.failures.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.pods.iter().all(PodOutcome::is_success)
    }

    pub fn sort(&mut self) {
        self.pods.sort_by(|a, b| a.pod.cmp(&b.pod));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_partitions_outcomes() {
        let mut ok = PodOutcome::new("dev-onezone-0");
        ok.record::<String>("oz-worker/src", Ok(()));
        let mut bad = PodOutcome::new("dev-onezone-1");
        bad.record("oz-worker/priv", Err("rsync exited with 23"));
        let gone = PodOutcome::abandoned("dev-onezone-2", "timeout");

        let report = SyncReport {
            pods: vec![ok, bad, gone],
        };
        assert_eq!(report.synced().count(), 1);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.abandoned().count(), 1);
        assert!(!report.is_success());
        assert_eq!(report.pods[1].failures, vec!["oz-worker/priv: rsync exited with 23"]);
    }
}
