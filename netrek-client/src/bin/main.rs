use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netrek_client::{ClientConfig, ClientRuntime, Credentials};
use protocol::PlayerInput;

#[derive(Parser, Debug)]
#[command(name = "netrek-client", about = "Connects to a netrek-server and streams world state")]
struct Cli {
    /// Path to a JSON config file (see `ClientConfig`). Falls back to
    /// built-in defaults when omitted. Also the output path for `--default`,
    /// which defaults to `netrek-client.json` when `--config` is absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a default config to `--config` (or `netrek-client.json`) and exit.
    #[arg(long)]
    default: bool,

    /// Server address, e.g. 127.0.0.1:4566.
    #[arg(long, required_unless_present = "default")]
    server: Option<String>,

    /// Player name to connect with.
    #[arg(long, required_unless_present = "default")]
    name: Option<String>,

    /// Team id to join.
    #[arg(long, default_value_t = 0)]
    team: i64,
}

#[tokio::main]
/// Connects, logs every incoming snapshot and chat message at `info`, and
/// sends a single idle `PlayerInput` on a timer to keep the session alive.
/// A real UI would replace the idle-input loop with actual controls wired
/// to [`ClientRuntime::send_input`]. Startup failures (bad config, failed
/// handshake) are fatal and reported with `anyhow`'s error chain.
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
        let path = cli.config.clone().unwrap_or_else(|| PathBuf::from("netrek-client.json"));
        ClientConfig::write_default(&path).context("failed to write default config")?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(());
    }

    let config = ClientConfig::resolve(cli.config.as_deref())
        .with_context(|| format!("failed to load config (path: {:?})", cli.config))?;

    let server = cli.server.expect("clap enforces --server unless --default is given");
    let name = cli.name.expect("clap enforces --name unless --default is given");

    let credentials = Credentials {
        player_name: name,
        team_id: cli.team,
    };

    let mut runtime = ClientRuntime::connect(server.clone(), credentials, config)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    tracing::info!(address = %server, "connected");

    let idle_input = PlayerInput {
        thrust: false,
        turn_left: false,
        turn_right: false,
        fire_weapon: -1,
        beam_down: false,
        beam_up: false,
        beam_amount: 0,
        target_id: 0,
    };

    let mut heartbeat = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            snapshot = runtime.next_snapshot() => match snapshot {
                Some(snapshot) => tracing::info!(
                    tick = snapshot.tick,
                    ships = snapshot.ships.len(),
                    planets = snapshot.planets.len(),
                    projectiles = snapshot.projectiles.len(),
                    "snapshot",
                ),
                None => {
                    tracing::warn!("snapshot stream closed");
                    break;
                }
            },
            chat = runtime.next_chat_message() => match chat {
                Some(message) => tracing::info!(?message, "chat"),
                None => {
                    tracing::warn!("chat stream closed");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(err) = runtime.send_input(idle_input.clone()).await {
                    tracing::debug!(%err, "idle input send failed");
                }
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}
