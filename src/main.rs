//! kubesrc CLI
//!
//! Usage: kubesrc <COMMAND>
//!
//! Commands:
//!   resolve  Resolve a scenario into values and node configs
//!   up       Resolve, install the release and sync sources
//!   sync     Push host sources into the running pods
//!   watch    Sync continuously on source changes
//!   clean    Uninstall the releases of a deployment

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kubesrc::application::{
    CleanUseCase, DeployUseCase, ResolveOptions, ResolveUseCase, SyncEngine, SyncReport,
    SyncSettings, WatchEngine, WatchEvent, WatchSettings,
};
use kubesrc::config::{self, Config};
use kubesrc::domain::services::HostLayout;
use kubesrc::infrastructure::{
    DeploymentsDir, FsSourceLocator, HelmReleases, KubectlCluster, RsyncTransport, YamlStateStore,
};

/// kubesrc - run cluster deployments from host source trees
#[derive(Parser, Debug)]
#[command(name = "kubesrc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output as NDJSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Kubernetes namespace
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Helm release name
    #[arg(long, global = true)]
    release: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a scenario into values and node configs
    Resolve {
        /// Scenario values file
        scenario: PathBuf,

        /// User overrides file (`sources`, per-service `clusterConfig`)
        #[arg(short, long)]
        overrides: Option<PathBuf>,

        /// Write into this deployment directory instead of a new one
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Resolve, install the release and sync sources
    Up {
        /// Scenario values file
        scenario: PathBuf,

        /// Helm chart to install
        #[arg(short, long)]
        chart: String,

        /// User overrides file
        #[arg(short, long)]
        overrides: Option<PathBuf>,

        /// Install only, do not sync sources
        #[arg(long)]
        no_sync: bool,
    },

    /// Push host sources into the running pods
    Sync {
        /// Only sync pods matching this pattern (`-` for all)
        pod: Option<String>,

        /// Deployment directory (defaults to the newest)
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Sync continuously on source changes
    Watch {
        /// Only watch pods matching this pattern (`-` for all)
        pod: Option<String>,

        /// Deployment directory (defaults to the newest)
        #[arg(short, long)]
        deployment: Option<PathBuf>,

        /// Skip the catch-up sync at start
        #[arg(long)]
        no_initial_sync: bool,
    },

    /// Uninstall the releases of a deployment and drop its state
    Clean {
        /// Deployment directory (defaults to the newest)
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let json = cli.json;

    match cli.command {
        Commands::Resolve {
            scenario,
            overrides,
            deployment,
        } => cmd_resolve(&config, scenario, overrides, deployment),
        Commands::Up {
            scenario,
            chart,
            overrides,
            no_sync,
        } => cmd_up(&config, scenario, overrides, &chart, no_sync, json),
        Commands::Sync { pod, deployment } => cmd_sync(&config, pod_filter(pod), deployment, json),
        Commands::Watch {
            pod,
            deployment,
            no_initial_sync,
        } => cmd_watch(&config, pod_filter(pod), deployment, no_initial_sync, json),
        Commands::Clean { deployment } => cmd_clean(&config, deployment, json),
    }
}

/// `-` and an empty pattern select every pod
fn pod_filter(pattern: Option<String>) -> Option<String> {
    pattern.filter(|p| !p.is_empty() && p != "-")
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kubesrc={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let (config, warnings) = config::load_or_default()?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    let mut config = config::with_env_overrides(config);
    if let Some(namespace) = &cli.namespace {
        config.cluster.namespace = namespace.clone();
    }
    if let Some(release) = &cli.release {
        config.cluster.release_name = release.clone();
    }
    Ok(config)
}

fn deployments(config: &Config) -> DeploymentsDir {
    DeploymentsDir::new(config.deployments_dir())
}

fn deployment_or_current(config: &Config, deployment: Option<PathBuf>) -> Result<PathBuf> {
    match deployment {
        Some(dir) => Ok(dir),
        None => Ok(deployments(config).current()?),
    }
}

fn new_deployment(config: &Config) -> Result<PathBuf> {
    let dirs = deployments(config);
    let dir = dirs.create(chrono::Local::now())?;
    dirs.prune(config.deployments.max_history)?;
    Ok(dir)
}

fn resolve_options(
    config: &Config,
    scenario: PathBuf,
    overrides: Option<PathBuf>,
    deployment_dir: PathBuf,
) -> ResolveOptions {
    ResolveOptions {
        scenario,
        overrides,
        host: HostLayout {
            home_dir: config.home_dir(),
            kube_home_dir: config.kube_home_dir(),
        },
        release: config.cluster.release_name.clone(),
        deployment_dir,
    }
}

fn resolve_use_case(store: Arc<YamlStateStore>) -> Result<ResolveUseCase> {
    let cwd = std::env::current_dir().context("cannot read working directory")?;
    Ok(ResolveUseCase::new(Arc::new(FsSourceLocator::new(&cwd)), store))
}

fn sync_engine(config: &Config, deployment_dir: &Path) -> SyncEngine {
    let namespace = config.cluster.namespace.clone();
    SyncEngine::new(
        Arc::new(KubectlCluster::new(namespace.as_str())),
        Arc::new(RsyncTransport::new(namespace)),
        Arc::new(YamlStateStore::in_deployment(deployment_dir)),
        deployment_dir,
        SyncSettings::from_config(config),
    )
}

fn cmd_resolve(
    config: &Config,
    scenario: PathBuf,
    overrides: Option<PathBuf>,
    deployment: Option<PathBuf>,
) -> Result<()> {
    let deployment_dir = match deployment {
        Some(dir) => dir,
        None => new_deployment(config)?,
    };
    let store = Arc::new(YamlStateStore::in_deployment(&deployment_dir));
    let options = resolve_options(config, scenario, overrides, deployment_dir);
    let result = resolve_use_case(store)?.execute(&options)?;

    println!("{}", result.values_file.display());
    Ok(())
}

fn cmd_up(
    config: &Config,
    scenario: PathBuf,
    overrides: Option<PathBuf>,
    chart: &str,
    no_sync: bool,
    json: bool,
) -> Result<()> {
    let deployment_dir = new_deployment(config)?;
    let store = Arc::new(YamlStateStore::in_deployment(&deployment_dir));
    let namespace = config.cluster.namespace.clone();

    let deploy = DeployUseCase::new(
        resolve_use_case(store.clone())?,
        Arc::new(HelmReleases::new(namespace)),
        store,
    );
    let options = resolve_options(config, scenario, overrides, deployment_dir.clone());
    let resolved = deploy.execute(&options, chart)?;

    if no_sync || (resolved.topology.sources.is_empty() && resolved.topology.clients.is_empty()) {
        return Ok(());
    }
    ensure_rsync()?;
    let report = sync_engine(config, &deployment_dir).sync_all(None)?;
    print_report(&report, json)
}

fn cmd_sync(
    config: &Config,
    pod: Option<String>,
    deployment: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let deployment_dir = deployment_or_current(config, deployment)?;
    ensure_rsync()?;
    let report = sync_engine(config, &deployment_dir).sync_all(pod.as_deref())?;
    print_report(&report, json)
}

fn cmd_watch(
    config: &Config,
    pod: Option<String>,
    deployment: Option<PathBuf>,
    no_initial_sync: bool,
    json: bool,
) -> Result<()> {
    let deployment_dir = deployment_or_current(config, deployment)?;
    ensure_rsync()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("cannot install Ctrl-C handler")?;

    let mut settings = WatchSettings::from_config(config);
    if no_initial_sync {
        settings.initial_sync = false;
    }
    settings.pod_filter = pod;
    let engine = WatchEngine::new(sync_engine(config, &deployment_dir), settings);
    let summary = engine.start(running, |event| print_watch_event(&event, json))?;

    tracing::info!(
        batches = summary.batches,
        events = summary.events,
        resyncs = summary.scheduled,
        "watch stopped"
    );
    Ok(())
}

fn cmd_clean(config: &Config, deployment: Option<PathBuf>, json: bool) -> Result<()> {
    let deployment_dir = deployment_or_current(config, deployment)?;
    let store = Arc::new(YamlStateStore::in_deployment(&deployment_dir));
    let releases = Arc::new(HelmReleases::new(config.cluster.namespace.clone()));
    let result = CleanUseCase::new(releases, store).execute()?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        for release in &result.uninstalled {
            println!("uninstalled {release}");
        }
        for (release, error) in &result.failed {
            eprintln!("failed to uninstall {release}: {error}");
        }
    }
    if !result.is_success() {
        bail!("{} release(s) could not be uninstalled", result.failed.len());
    }
    Ok(())
}

fn ensure_rsync() -> Result<()> {
    if !RsyncTransport::check_available() {
        bail!("rsync is not installed or not on PATH");
    }
    Ok(())
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        for pod in &report.pods {
            match &pod.abandoned {
                Some(reason) => println!("✗ {}: {}", pod.pod, reason),
                None if pod.failures.is_empty() => {
                    println!("✓ {} ({} synced)", pod.pod, pod.synced.len())
                }
                None => {
                    println!("✗ {}", pod.pod);
                    for failure in &pod.failures {
                        println!("    {failure}");
                    }
                }
            }
        }
    }
    if !report.is_success() {
        let failed = report.pods.iter().filter(|p| !p.is_success()).count();
        bail!("{failed} pod(s) were not fully synced");
    }
    Ok(())
}

fn print_watch_event(event: &WatchEvent, json: bool) {
    if json {
        println!("{}", event.to_json());
        return;
    }
    match event {
        WatchEvent::WatchStarted { watching } => {
            println!("Watching {} directories (Ctrl-C to stop)", watching.len())
        }
        WatchEvent::ChangesDetected { events, keys } => {
            tracing::debug!(events, keys, "changes detected")
        }
        WatchEvent::SyncComplete { pod, synced } => println!("✓ {pod}: {}", synced.join(", ")),
        WatchEvent::SyncFailed { pod, errors } => {
            println!("✗ {pod}");
            for error in errors {
                println!("    {error}");
            }
        }
        WatchEvent::Shutdown => println!("Stopped"),
    }
}
