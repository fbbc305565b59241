//! Playback Host (rfmp-ph) - Main entry point
//!
//! Receives play commands from the scan host and supervises the single
//! external player process.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rfmp_common::config::{load_toml, resolve_root_folder};
use rfmp_ph::api::{self, AppContext};
use rfmp_ph::config::{TomlConfig, ROOT_FOLDER_ENV};
use rfmp_ph::PlaybackSupervisor;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for rfmp-ph
#[derive(Parser, Debug)]
#[command(name = "rfmp-ph")]
#[command(about = "Playback host for RFMP")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: ~/.config/rfmp/rfmp-ph.toml)
    #[arg(short, long, env = "RFMP_PH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RFMP_PH_PORT")]
    port: Option<u16>,

    /// Music root; relative play directories resolve against it
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Player program (overrides [player].program)
    #[arg(long, env = "RFMP_PLAYER")]
    player: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config: TomlConfig =
        load_toml(args.config.as_deref(), "rfmp-ph").context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(player) = args.player {
        config.player.program = player;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rfmp_ph={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting RFMP Playback Host (rfmp-ph) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let music_root = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        config.root_folder.as_deref(),
    );
    info!("Music root: {}", music_root.display());
    if !music_root.is_dir() {
        warn!("Music root is not accessible; mount the music share before scanning cards");
    }

    if !api::handlers::program_available(&config.player.program) {
        warn!("Player program '{}' not found", config.player.program);
    }
    info!(
        "Player: {} {} (grace period {} ms)",
        config.player.program,
        config.player.args.join(" "),
        config.player.grace_period_ms
    );

    let supervisor = PlaybackSupervisor::new(music_root, config.player.clone());

    let ip = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);

    api::run(addr, AppContext::new(supervisor.clone()), shutdown_signal())
        .await
        .context("Server error")?;

    supervisor.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
