mod config;
mod dispatcher;
mod error;
mod frame_io;
mod governor;
mod session;
mod validation;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netrek_sim::Simulation;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::governor::ResourceGovernor;

#[derive(Parser, Debug)]
#[command(name = "netrek-server", about = "Authoritative netrek-style game server")]
struct Cli {
    /// Path to a JSON config file (see `ServerConfig`).
    #[arg(long, default_value = "netrek-server.json")]
    config: PathBuf,

    /// Write a default config to `--config` and exit.
    #[arg(long)]
    default: bool,
}

#[tokio::main]
/// Loads config, binds the dispatcher, and runs until ctrl-c or the memory
/// watchdog trips, then drains sessions before exiting. Startup failures
/// (bad config, bind failure) are fatal and reported with `anyhow`'s error
/// chain; everything past startup uses the typed errors in `error`.
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal error during startup");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.default {
        ServerConfig::write_default(&cli.config).context("failed to write default config")?;
        tracing::info!(path = %cli.config.display(), "wrote default config");
        return Ok(());
    }

    let config = ServerConfig::load(&cli.config).context("failed to load config")?;

    let addr = config.network.addr.clone();
    let shutdown_timeout = std::time::Duration::from_secs_f64(config.governor.shutdown_timeout_secs);
    let resource_check_interval = std::time::Duration::from_secs_f64(config.governor.resource_check_interval_secs);
    let max_memory_mb = config.governor.max_memory_mb;

    let governor = ResourceGovernor::new(config.governor.max_tasks);
    let sim = Simulation::new(config.simulation.clone());
    let dispatcher = Dispatcher::new(config, sim, governor.clone());

    dispatcher.start(&addr).await.with_context(|| format!("failed to bind listener on {addr}"))?;
    tracing::info!(address = %addr, "netrek-server listening");

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    governor
        .run_memory_watchdog(resource_check_interval, max_memory_mb, governor::sample_rss_mb, shutdown_signal)
        .await;

    tracing::info!("shutdown signal received, draining sessions");
    dispatcher.stop().await;
    if let Err(err) = governor.shutdown(shutdown_timeout).await {
        tracing::warn!(%err, "shutdown timed out; exiting anyway");
    } else {
        tracing::info!("graceful shutdown complete");
    }
    Ok(())
}
