//! Application entity
//!
//! An application is one runtime on a node. Its settings are the file and
//! command locations the panel writes into the node's runtime configuration;
//! they point either into the packaged install (`/etc/<app>`, `service <app>`)
//! or into a host release tree (`<checkout>/_build/default/rel/<app>`).

use std::path::{Path, PathBuf};

use crate::domain::value_objects::{AppName, AppType};

/// Relative location of a compiled release inside a checkout
pub fn rel_sources_dir(app: AppName) -> PathBuf {
    Path::new("_build")
        .join("default")
        .join("rel")
        .join(app.release_name())
}

/// Where the pieces of a release live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSettings {
    pub vm_args_file: String,
    pub app_config_file: String,
    pub generated_config_file: String,
    pub overlay_config_file: String,
}

/// How the runtime is controlled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSettings {
    pub cmd: String,
    pub start_cmd: String,
    pub stop_cmd: String,
    pub status_cmd: String,
}

/// TLS material served by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSettings {
    pub web_key_file: String,
    pub web_cert_file: String,
    pub cacerts_dir: String,
}

/// Per-role settings. Every variant renders to an ordered list of
/// `(attribute, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppSettings {
    Worker {
        web: WebSettings,
        files: FileSettings,
        commands: CommandSettings,
    },
    Panel {
        commands: CommandSettings,
        files: FileSettings,
    },
    ClusterManager {
        env_file: String,
        files: FileSettings,
        commands: CommandSettings,
    },
    /// The thin client has no panel-managed settings
    Client,
}

/// Path layout used to build settings for one location
struct Layout<'a> {
    name: &'a str,
    root: Option<&'a Path>,
}

impl Layout<'_> {
    fn path(&self, packaged: String, released: &str) -> String {
        match self.root {
            Some(root) => root.join(released).display().to_string(),
            None => packaged,
        }
    }

    fn files(&self) -> FileSettings {
        let n = self.name;
        FileSettings {
            vm_args_file: self.path(format!("/etc/{n}/vm.args"), "etc/vm.args"),
            app_config_file: self.path(format!("/var/lib/{n}/app.config"), "data/app.config"),
            generated_config_file: self.path(
                format!("/etc/{n}/autogenerated.config"),
                "etc/autogenerated.config",
            ),
            overlay_config_file: self.path(format!("/etc/{n}/overlay.config"), "etc/overlay.config"),
        }
    }

    fn commands(&self) -> CommandSettings {
        let n = self.name;
        match self.root {
            Some(root) => {
                let bin = root.join("bin").join(n).display().to_string();
                CommandSettings {
                    cmd: bin.clone(),
                    start_cmd: format!("{bin} start"),
                    stop_cmd: format!("{bin} stop"),
                    status_cmd: format!("{bin} ping"),
                }
            }
            None => CommandSettings {
                cmd: format!("service {n}"),
                start_cmd: format!("service {n} start"),
                stop_cmd: format!("service {n} stop"),
                status_cmd: format!("service {n} ping"),
            },
        }
    }

    fn web(&self) -> WebSettings {
        let n = self.name;
        WebSettings {
            web_key_file: self.path(format!("/etc/{n}/certs/web_key.pem"), "etc/certs/web_key.pem"),
            web_cert_file: self.path(format!("/etc/{n}/certs/web_cert.pem"), "etc/certs/web_cert.pem"),
            cacerts_dir: self.path(format!("/etc/{n}/cacerts/"), "etc/cacerts/"),
        }
    }

    fn env_file(&self) -> String {
        self.path(format!("/usr/lib/{}/lib/env.sh", self.name), "lib/env.sh")
    }
}

impl AppSettings {
    /// Settings for the packaged install, or for a release tree when `release_path` is set
    pub fn for_app(app: AppName, release_path: Option<&Path>) -> Self {
        let name = app.release_name();
        let layout = Layout {
            name: &name,
            root: release_path,
        };
        match app.app_type() {
            AppType::Worker => AppSettings::Worker {
                web: layout.web(),
                files: layout.files(),
                commands: layout.commands(),
            },
            AppType::Panel => AppSettings::Panel {
                commands: layout.commands(),
                files: layout.files(),
            },
            AppType::ClusterManager => AppSettings::ClusterManager {
                env_file: layout.env_file(),
                files: layout.files(),
                commands: layout.commands(),
            },
            AppType::Client => AppSettings::Client,
        }
    }

    pub fn attribute_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        match self {
            AppSettings::Worker { web, files, commands } => {
                push_web(&mut pairs, web);
                push_files(&mut pairs, files);
                push_commands(&mut pairs, commands);
            }
            AppSettings::Panel { commands, files } => {
                push_commands(&mut pairs, commands);
                push_files(&mut pairs, files);
            }
            AppSettings::ClusterManager {
                env_file,
                files,
                commands,
            } => {
                pairs.push(("env_file", env_file.clone()));
                push_files(&mut pairs, files);
                push_commands(&mut pairs, commands);
            }
            AppSettings::Client => {}
        }
        pairs
    }
}

fn push_files(pairs: &mut Vec<(&'static str, String)>, f: &FileSettings) {
    pairs.push(("vm_args_file", f.vm_args_file.clone()));
    pairs.push(("app_config_file", f.app_config_file.clone()));
    pairs.push(("generated_config_file", f.generated_config_file.clone()));
    pairs.push(("overlay_config_file", f.overlay_config_file.clone()));
}

fn push_commands(pairs: &mut Vec<(&'static str, String)>, c: &CommandSettings) {
    pairs.push(("cmd", c.cmd.clone()));
    pairs.push(("start_cmd", c.start_cmd.clone()));
    pairs.push(("stop_cmd", c.stop_cmd.clone()));
    pairs.push(("status_cmd", c.status_cmd.clone()));
}

fn push_web(pairs: &mut Vec<(&'static str, String)>, w: &WebSettings) {
    pairs.push(("web_key_file", w.web_key_file.clone()));
    pairs.push(("web_cert_file", w.web_cert_file.clone()));
    pairs.push(("cacerts_dir", w.cacerts_dir.clone()));
}

/// One application on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    name: AppName,
    settings: AppSettings,
    /// Host checkout the app is sourced from; `None` when package-based
    source_path: Option<PathBuf>,
}

impl Application {
    /// Application running from the packaged image
    pub fn packaged(name: AppName) -> Self {
        Self {
            name,
            settings: AppSettings::for_app(name, None),
            source_path: None,
        }
    }

    /// Application running from a host checkout at `source_path`
    pub fn sourced(name: AppName, source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let release = source_path.join(rel_sources_dir(name));
        Self {
            name,
            settings: AppSettings::for_app(name, Some(&release)),
            source_path: Some(source_path),
        }
    }

    pub fn name(&self) -> AppName {
        self.name
    }

    pub fn app_type(&self) -> AppType {
        self.name.app_type()
    }

    pub fn is_panel(&self) -> bool {
        self.name.is_panel()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// `<checkout>/_build/default/rel/<app>`; set only when sourced
    pub fn release_path(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .map(|p| p.join(rel_sources_dir(self.name)))
    }

    /// Key under which an attribute appears in runtime config files.
    ///
    /// Panel attributes live under the fixed `onepanel` prefix; everything
    /// else is prefixed with its own release name.
    pub fn attribute_key(&self, attribute: &str) -> String {
        if self.is_panel() {
            format!("{}_{}", super::node::CONFIG_ROOT, attribute)
        } else {
            format!("{}_{}", self.name.release_name(), attribute)
        }
    }

    /// Settings as `(key, value)` pairs ready for rendering or patching
    pub fn keyed_attributes(&self) -> Vec<(String, String)> {
        self.settings
            .attribute_pairs()
            .into_iter()
            .map(|(attr, val)| (self.attribute_key(attr), val))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packaged_worker_points_at_system_paths() {
        let app = Application::packaged(AppName::OzWorker);
        let pairs = app.settings().attribute_pairs();
        assert_eq!(pairs[0], ("web_key_file", "/etc/oz_worker/certs/web_key.pem".to_string()));
        assert!(pairs.contains(&("start_cmd", "service oz_worker start".to_string())));
        assert_eq!(app.release_path(), None);
    }

    #[test]
    fn sourced_app_points_into_release_tree() {
        let app = Application::sourced(AppName::ClusterManager, "/home/u/cluster-manager");
        let release = "/home/u/cluster-manager/_build/default/rel/cluster_manager";
        assert_eq!(app.release_path().unwrap(), PathBuf::from(release));
        let pairs = app.settings().attribute_pairs();
        assert_eq!(pairs[0], ("env_file", format!("{release}/lib/env.sh")));
        assert!(pairs.contains(&("status_cmd", format!("{release}/bin/cluster_manager ping"))));
    }

    #[test]
    fn panel_keys_use_root_prefix() {
        let panel = Application::packaged(AppName::OpPanel);
        assert_eq!(panel.attribute_key("cmd"), "onepanel_cmd");
        let worker = Application::packaged(AppName::OpWorker);
        assert_eq!(worker.attribute_key("cmd"), "op_worker_cmd");
    }

    #[test]
    fn attribute_counts_per_role() {
        assert_eq!(Application::packaged(AppName::OzWorker).keyed_attributes().len(), 11);
        assert_eq!(Application::packaged(AppName::OzPanel).keyed_attributes().len(), 8);
        assert_eq!(Application::packaged(AppName::ClusterManager).keyed_attributes().len(), 9);
        assert!(Application::packaged(AppName::Oneclient).keyed_attributes().is_empty());
    }
}
