//! Scan Host (rfmp-sh) - Main entry point
//!
//! Reads card scans, resolves them against the mapping database and sends
//! play commands to the playback host.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rfmp_common::config::{load_toml, resolve_root_folder};
use rfmp_sh::api::{self, AppContext};
use rfmp_sh::config::{TomlConfig, ROOT_FOLDER_ENV};
use rfmp_sh::input::capture::{run_capture, ScanInput};
use rfmp_sh::{
    DispatchClient, HandoffQueue, MappingResolver, Pipeline, ScanCapture, ScanEvent,
    SqliteMappingStore,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long an in-flight dispatch may finish after shutdown is requested
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for rfmp-sh
#[derive(Parser, Debug)]
#[command(name = "rfmp-sh")]
#[command(about = "Scan host for RFMP")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: ~/.config/rfmp/rfmp-sh.toml)
    #[arg(short, long, env = "RFMP_SH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RFMP_SH_PORT")]
    port: Option<u16>,

    /// Folder holding the mapping database (rfmp.db)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Playback host base URL (overrides [dispatch].endpoint)
    #[arg(long, env = "RFMP_PH_URL")]
    playback_host: Option<String>,

    /// Card reader input device (overrides [scan].device)
    #[arg(long)]
    device: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config: TomlConfig =
        load_toml(args.config.as_deref(), "rfmp-sh").context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.playback_host {
        config.dispatch.endpoint = url;
    }
    if let Some(device) = args.device {
        config.scan.device = Some(device);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rfmp_sh={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting RFMP Scan Host (rfmp-sh) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        config.root_folder.as_deref(),
    );
    info!("Root folder: {}", root_folder.display());

    let store = SqliteMappingStore::open(&root_folder)
        .await
        .context("Failed to open mapping store")?;

    let dispatcher = DispatchClient::new(&config.dispatch).context("Failed to create dispatch client")?;
    info!(
        "Dispatching to {} (timeout {} ms, {} retries)",
        dispatcher.play_url(),
        config.dispatch.timeout_ms,
        config.dispatch.max_retries
    );

    let pipeline = Pipeline::new(MappingResolver::new(store.clone()), dispatcher);
    let queue: HandoffQueue<ScanEvent> = HandoffQueue::new(config.scan.queue_capacity);

    let worker = {
        let pipeline = pipeline.clone();
        let queue = queue.clone();
        tokio::spawn(async move { pipeline.run(queue).await })
    };

    let input = ScanInput::open(&config.scan).context("Failed to open scan input")?;
    let capture = tokio::spawn(run_capture(
        input,
        ScanCapture::new(&config.scan),
        queue.clone(),
    ));
    let capture_monitor = tokio::spawn(async move {
        match capture.await {
            Ok(Ok(())) => warn!("Scan capture ended; only POST /scan will trigger playback"),
            Ok(Err(e)) => error!("Scan capture failed: {}", e),
            Err(e) => error!("Scan capture task failed: {}", e),
        }
    });

    let ip = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);

    api::run(addr, AppContext::new(pipeline), shutdown_signal())
        .await
        .context("Server error")?;

    queue.close();
    capture_monitor.abort();
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Pipeline worker did not finish in time");
    }
    store.close().await;

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
