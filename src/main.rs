//! Vinyl GW - turntable controller gateway
//!
//! Runs the serial bridge (default), the now-playing display, or the sniffer.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vinyl_gw::bridge::SerialBridge;
use vinyl_gw::config::{AppConfig, ConfigWatcher};
use vinyl_gw::paths::AppPaths;
use vinyl_gw::surface::{CommandRunner, SystemRunner};
use vinyl_gw::{display, sniffer};

/// Vinyl GW - Drive media playback and volume from a turntable controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run the now-playing display instead of the serial bridge
    #[arg(long, conflicts_with = "sniffer")]
    display: bool,

    /// Print classified serial lines without acting on them
    #[arg(long)]
    sniffer: bool,

    /// Sniffer output as JSON lines
    #[arg(long, requires = "sniffer")]
    json: bool,

    /// List available serial ports
    #[arg(long)]
    list_ports: bool,

    /// Serial port (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    let paths = AppPaths::detect(args.config.as_deref());
    let mut config = AppConfig::load_or_default(&paths.config).await?;
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }

    let log_dir = config.logging.as_ref().map(|l| paths.resolve(&l.file));
    let _log_guard = init_logging(&args.log_level, log_dir.as_deref())?;

    info!("Starting Vinyl GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    if args.sniffer {
        return sniffer::run_sniffer(&config.serial, config.volume.range, args.json).await;
    }

    let runner = Arc::new(SystemRunner::new(config.media.command_timeout()));

    let required: &[&str] = if args.display {
        &["playerctl"]
    } else {
        &["playerctl", "wpctl"]
    };
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|tool| !runner.is_available(tool))
        .collect();
    if !missing.is_empty() {
        bail!("Required tool(s) not found in PATH: {}", missing.join(", "));
    }

    if args.display {
        let volume_enabled = runner.is_available("wpctl");
        if !volume_enabled {
            warn!("⚠️  wpctl not found, volume overlay disabled");
        }

        let handle = tokio::runtime::Handle::current();
        tokio::task::block_in_place(|| {
            display::run_display(&config, runner, handle, volume_enabled)
        })?;

        info!("Display closed");
        return Ok(());
    }

    let watcher = if tokio::fs::try_exists(&paths.config).await.unwrap_or(false) {
        match ConfigWatcher::new(paths.config.clone()) {
            Ok(watcher) => {
                info!("Configuration loaded with hot-reload enabled");
                Some(watcher)
            }
            Err(e) => {
                warn!("⚠️  Config hot-reload unavailable: {:#}", e);
                None
            }
        }
    } else {
        info!("No configuration file, using defaults");
        None
    };

    let bridge = SerialBridge::new(config, runner).with_port_override(args.port);
    bridge.run(watcher, shutdown_signal()).await?;

    info!("Vinyl GW shutdown complete");
    Ok(())
}

/// Console logging plus an optional daily-rolling file
///
/// The returned guard flushes the file writer on drop.
fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "vinyl-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // stdout stays clean for the sniffer's JSON output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
