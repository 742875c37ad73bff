//! fleetgauge - cluster fleet exporter
//!
//! Polls a cloud cluster inventory and exports one labeled gauge
//! series per cluster for Prometheus to scrape.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fleet_exporter::{
    FailurePolicy, HttpInventoryProvider, MetricSynchronizer, MetricsServer, Poller, PollerConfig,
    Settings, SnapshotHandle,
};
use fleet_tags::{ExprEvaluator, LabelResolver};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable for the inventory API username.
const ENV_API_USER: &str = "INVENTORY_API_USER";
/// Environment variable for the inventory API key.
const ENV_API_KEY: &str = "INVENTORY_API_KEY";

#[derive(Parser)]
#[command(name = "fleetgauge")]
#[command(about = "Cluster fleet exporter for Prometheus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the exporter: poll the inventory and serve /metrics
    Run {
        /// Path to the settings file
        #[arg(short, long, env = "SETTINGS_PATH")]
        settings: PathBuf,

        /// Inventory API base URL (project and clusters path are appended)
        #[arg(long, env = "INVENTORY_URL")]
        inventory_url: String,

        /// Listen address for the metrics endpoint
        #[arg(long, default_value = "0.0.0.0:5000")]
        listen: SocketAddr,

        /// Seconds between poll cycles
        #[arg(long, default_value_t = fleet_exporter::DEFAULT_INTERVAL_SECS)]
        interval_secs: u64,

        /// Bound on a single inventory fetch, in seconds
        #[arg(long, default_value_t = fleet_exporter::DEFAULT_FETCH_TIMEOUT_SECS)]
        fetch_timeout_secs: u64,

        /// Discard a whole cycle on the first resolution failure
        /// instead of skipping the offending cluster
        #[arg(long)]
        abort_on_error: bool,
    },

    /// Validate a settings file and print the label schema
    Check {
        /// Path to the settings file
        #[arg(short, long, env = "SETTINGS_PATH")]
        settings: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("fleetgauge=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            settings,
            inventory_url,
            listen,
            interval_secs,
            fetch_timeout_secs,
            abort_on_error,
        } => {
            run(
                settings,
                &inventory_url,
                listen,
                interval_secs,
                fetch_timeout_secs,
                abort_on_error,
            )
            .await
        }
        Commands::Check { settings } => check(&settings),
    }
}

async fn run(
    settings_path: PathBuf,
    inventory_url: &str,
    listen: SocketAddr,
    interval_secs: u64,
    fetch_timeout_secs: u64,
    abort_on_error: bool,
) -> anyhow::Result<()> {
    // A malformed settings file must fail startup, not first scrape.
    let settings = Settings::load(&settings_path)?;
    info!(
        project = %settings.project_id,
        tags = settings.tags.len(),
        "settings loaded"
    );

    let provider = HttpInventoryProvider::new(
        inventory_url,
        &settings.project_id,
        credentials_from_env(),
    );
    info!(url = provider.url(), "inventory endpoint");

    let resolver = LabelResolver::new(Arc::new(settings.tags), ExprEvaluator::new());
    let handle = SnapshotHandle::new();
    let policy = if abort_on_error {
        FailurePolicy::AbortCycle
    } else {
        FailurePolicy::SkipCluster
    };
    let synchronizer = MetricSynchronizer::new(resolver, handle.clone(), policy);

    let poller = Poller::new(
        provider,
        synchronizer,
        PollerConfig {
            interval: Duration::from_secs(interval_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        },
    );
    tokio::spawn(poller.run());

    let server = MetricsServer::new(handle);
    server.serve(listen).await?;
    Ok(())
}

fn check(settings_path: &Path) -> anyhow::Result<()> {
    let settings = Settings::load(settings_path)?;
    println!("settings OK: project {}", settings.project_id);
    for name in settings.tags.label_names() {
        println!("  label: {name}");
    }
    Ok(())
}

fn credentials_from_env() -> Option<(String, String)> {
    let user = std::env::var(ENV_API_USER).ok()?;
    let key = std::env::var(ENV_API_KEY).ok()?;
    Some((user, key))
}
