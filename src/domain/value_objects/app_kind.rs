//! Application and service role identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role an application plays on its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppType {
    Worker,
    Panel,
    ClusterManager,
    Client,
}

/// Every application the deployments know how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AppName {
    #[serde(rename = "oz-panel")]
    OzPanel,
    #[serde(rename = "oz-worker")]
    OzWorker,
    #[serde(rename = "op-panel")]
    OpPanel,
    #[serde(rename = "op-worker")]
    OpWorker,
    #[serde(rename = "cluster-manager")]
    ClusterManager,
    #[serde(rename = "oneclient")]
    Oneclient,
}

impl AppName {
    pub const ALL: [AppName; 6] = [
        AppName::OzPanel,
        AppName::OzWorker,
        AppName::OpPanel,
        AppName::OpWorker,
        AppName::ClusterManager,
        AppName::Oneclient,
    ];

    /// Name as written in configuration files (`oz-worker`)
    pub fn as_str(&self) -> &'static str {
        match self {
            AppName::OzPanel => "oz-panel",
            AppName::OzWorker => "oz-worker",
            AppName::OpPanel => "op-panel",
            AppName::OpWorker => "op-worker",
            AppName::ClusterManager => "cluster-manager",
            AppName::Oneclient => "oneclient",
        }
    }

    /// Name as used by the release layout and the runtime (`oz_worker`)
    pub fn release_name(&self) -> String {
        self.as_str().replace('-', "_")
    }

    pub fn app_type(&self) -> AppType {
        match self {
            AppName::OzPanel | AppName::OpPanel => AppType::Panel,
            AppName::OzWorker | AppName::OpWorker => AppType::Worker,
            AppName::ClusterManager => AppType::ClusterManager,
            AppName::Oneclient => AppType::Client,
        }
    }

    pub fn is_panel(&self) -> bool {
        self.app_type() == AppType::Panel
    }

    /// Directory names a host checkout of this app may live under
    pub fn checkout_dirs(&self) -> &'static [&'static str] {
        match self {
            AppName::OzPanel => &["oz-panel", "oz_panel", "onepanel"],
            AppName::OzWorker => &["oz-worker", "oz_worker"],
            AppName::OpPanel => &["op-panel", "op_panel", "onepanel"],
            AppName::OpWorker => &["op-worker", "op_worker"],
            AppName::ClusterManager => &["cluster-manager", "cluster_manager"],
            AppName::Oneclient => &["oneclient"],
        }
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application '{0}'")]
pub struct UnknownApp(pub String);

impl FromStr for AppName {
    type Err = UnknownApp;

    /// Accepts both `oz-worker` and `oz_worker`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-");
        AppName::ALL
            .into_iter()
            .find(|app| app.as_str() == normalized)
            .ok_or_else(|| UnknownApp(s.to_string()))
    }
}

/// Role family of a service; decides its canonical application set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Zone coordinator cluster
    Zone,
    /// Storage-provider cluster
    Provider,
    /// Thin client
    Client,
}

impl ServiceRole {
    /// Derive the role from a service or chart name
    pub fn from_service_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("zone") {
            ServiceRole::Zone
        } else if lower.contains("client") {
            ServiceRole::Client
        } else {
            ServiceRole::Provider
        }
    }

    /// Value of the pod `component` label
    pub fn component(&self) -> &'static str {
        match self {
            ServiceRole::Zone => "onezone",
            ServiceRole::Provider => "oneprovider",
            ServiceRole::Client => "oneclient",
        }
    }

    pub fn from_component(component: &str) -> Option<Self> {
        match component {
            "onezone" => Some(ServiceRole::Zone),
            "oneprovider" => Some(ServiceRole::Provider),
            "oneclient" => Some(ServiceRole::Client),
            _ => None,
        }
    }

    /// Canonical application set, panel first
    pub fn apps(&self) -> &'static [AppName] {
        match self {
            ServiceRole::Zone => &[AppName::OzPanel, AppName::ClusterManager, AppName::OzWorker],
            ServiceRole::Provider => &[AppName::OpPanel, AppName::ClusterManager, AppName::OpWorker],
            ServiceRole::Client => &[AppName::Oneclient],
        }
    }

    pub fn panel(&self) -> Option<AppName> {
        self.apps().iter().copied().find(AppName::is_panel)
    }

    /// Key prefix for the node count Helm value (`onezone_nodes_count`)
    pub fn nodes_count_key(&self) -> String {
        format!("{}_nodes_count", self.component())
    }
}

/// Named providers and their numbered aliases, in both directions
const SERVICE_ALIASES: &[(&str, &str)] = &[
    ("oneprovider-krakow", "oneprovider-1"),
    ("oneprovider-paris", "oneprovider-2"),
    ("oneprovider-lisbon", "oneprovider-3"),
    ("oneprovider-1", "oneprovider-krakow"),
    ("oneprovider-2", "oneprovider-paris"),
    ("oneprovider-3", "oneprovider-lisbon"),
    ("onezone", "onezone"),
];

/// Alternative name a service may be addressed by in user overrides.
/// The first table entry contained in `service` wins.
pub fn service_alias(service: &str) -> Option<&'static str> {
    SERVICE_ALIASES
        .iter()
        .find(|(name, _)| service.contains(name))
        .map(|(_, alias)| *alias)
}
