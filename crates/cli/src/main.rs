use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use contest_core::{AppConfig, ConfigLoader};
use contest_monitor::{CycleRunner, CycleScheduler};
use contest_store::{DatabaseClient, LeaderboardRepository, RetryPolicy};
use contest_terminal::{BridgeConfig, BridgeTerminal};
use contest_web_api::ApiServer;

#[derive(Parser)]
#[command(name = "contest")]
#[command(about = "MT5 trading-contest leaderboard monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor loop and the read API together
    Run,
    /// Run only the monitor loop
    Monitor,
    /// Run only the read API server
    Server,
    /// Run a single sampling cycle and exit
    Cycle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    match cli.command {
        Commands::Run => run_monitor(config, true).await,
        Commands::Monitor => run_monitor(config, false).await,
        Commands::Server => run_server(config).await,
        Commands::Cycle => run_cycle(config).await,
    }
}

/// Connects the pool, applies migrations and wires the retry schedule.
async fn connect_repository(config: &AppConfig) -> Result<Arc<LeaderboardRepository>> {
    let db = DatabaseClient::connect(&config.database).await?;
    let retry = RetryPolicy::new(
        config.monitor.store_retry_attempts,
        Duration::from_secs(config.monitor.store_retry_delay_secs),
    );
    Ok(Arc::new(
        LeaderboardRepository::new(db.pool()).with_retry_policy(retry),
    ))
}

fn build_scheduler(
    config: &AppConfig,
    repo: Arc<LeaderboardRepository>,
) -> Result<CycleScheduler> {
    if config.accounts.is_empty() {
        bail!("no accounts configured: add [[accounts]] entries to config/Config.toml");
    }

    let terminal = BridgeTerminal::new(BridgeConfig::from_app(&config.terminal))
        .map_err(|e| anyhow::anyhow!("bridge client setup failed: {e}"))?;

    let runner = CycleRunner::new(
        Arc::new(terminal),
        repo.clone(),
        config.risk.limits(),
        config.monitor.history_start,
        Duration::from_millis(config.monitor.account_pause_ms),
    );

    Ok(CycleScheduler::new(
        config.accounts.clone(),
        runner,
        repo,
        Duration::from_secs(config.monitor.cycle_retry_delay_secs),
    ))
}

async fn run_monitor(config: AppConfig, with_api: bool) -> Result<()> {
    let repo = connect_repository(&config).await?;
    let scheduler = Arc::new(build_scheduler(&config, repo.clone())?);

    let monitor = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    if with_api {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let api = ApiServer::new(repo);

        tokio::select! {
            () = shutdown_signal() => info!("shutdown signal received"),
            result = api.serve(&addr) => result?,
            _ = monitor => error!("monitor loop ended unexpectedly"),
        }
    } else {
        tokio::select! {
            () = shutdown_signal() => info!("shutdown signal received"),
            _ = monitor => error!("monitor loop ended unexpectedly"),
        }
    }

    Ok(())
}

async fn run_server(config: AppConfig) -> Result<()> {
    let repo = connect_repository(&config).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let api = ApiServer::new(repo);

    tokio::select! {
        () = shutdown_signal() => info!("shutdown signal received"),
        result = api.serve(&addr) => result?,
    }

    Ok(())
}

async fn run_cycle(config: AppConfig) -> Result<()> {
    let repo = connect_repository(&config).await?;
    let scheduler = build_scheduler(&config, repo)?;

    match scheduler.run_once().await? {
        Some(summary) => info!(
            applied = summary.applied,
            latched = summary.latched,
            "cycle finished"
        ),
        None => info!("another cycle was already in flight"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
