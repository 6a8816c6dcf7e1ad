use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing_subscriber::EnvFilter;

use vitals::aggregator::{run_sweeper, HealthPoller, InstanceRegistry};
use vitals::api::{create_aggregator_router, create_instance_router, serve};
use vitals::config::load_file;
use vitals::engine::HealthService;
use vitals::registration::RegistrationClient;
use vitals::{AggregatorConfig, InstanceConfig};

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Composite health endpoints and fleet registration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve this instance's health groups and register with an aggregator
    Instance {
        #[arg(short, long, help = "Path to a .toml or .yaml config file")]
        config: PathBuf,
    },
    /// Run the central registry that tracks fleet-wide instance state
    Aggregator {
        #[arg(short, long, help = "Path to a .toml or .yaml config file")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Instance { config } => run_instance(&config).await?,
        Commands::Aggregator { config } => run_aggregator(config.as_deref()).await?,
    }

    Ok(())
}

async fn run_instance(path: &std::path::Path) -> Result<()> {
    let config: InstanceConfig = load_file(path)?;
    let config = config.with_env_overrides();
    config.validate()?;

    // Group validation happens here, before anything is served.
    let service = HealthService::from_config(&config.indicators, &config.groups)
        .context("invalid health configuration")?;
    let groups: Vec<&str> = service.groups().names().collect();
    log::info!(
        "{} indicators registered, groups: {}",
        service.registry().len(),
        groups.join(", ")
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let registration = match RegistrationClient::from_config(&config)? {
        Some(client) => Some(tokio::spawn(client.run(shutdown_rx.clone()))),
        None => {
            log::info!("no aggregator configured, registration disabled");
            None
        }
    };

    let app = create_instance_router(Arc::new(service));
    serve(app, &config.server.bind, shutdown_signal(shutdown_tx)).await?;

    if let Some(handle) = registration {
        report_task("registration", handle.await);
    }
    Ok(())
}

async fn run_aggregator(path: Option<&std::path::Path>) -> Result<()> {
    let config: AggregatorConfig = match path {
        Some(path) => load_file(path)?,
        None => AggregatorConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate()?;

    let registry = Arc::new(InstanceRegistry::new(config.grace_window()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = tokio::spawn(run_sweeper(
        registry.clone(),
        config.sweep_interval(),
        shutdown_rx.clone(),
    ));
    let poller = HealthPoller::new(
        registry.clone(),
        config.poll_timeout(),
        config.poll_concurrency,
    )?;
    let poller = tokio::spawn(poller.run(config.poll_interval(), shutdown_rx));

    log::info!(
        "aggregator grace window {:?}, sweep every {:?}, poll every {:?}",
        config.grace_window(),
        config.sweep_interval(),
        config.poll_interval()
    );

    let app = create_aggregator_router(registry);
    serve(app, &config.bind, shutdown_signal(shutdown_tx)).await?;

    let (sweeper, poller) = tokio::join!(sweeper, poller);
    report_task("sweeper", sweeper);
    report_task("health poller", poller);
    Ok(())
}

fn report_task(name: &str, outcome: Result<(), JoinError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            log::error!("{} task failed: {}", name, e);
            false
        }
    }
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
    let _ = shutdown.send(true);
}
