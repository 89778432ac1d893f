//! Socksgate - Forward SOCKS4/4a/5 Proxy
//!
//! This is the main entry point for the Socksgate daemon.

use anyhow::{Context, Result};
use clap::Parser;
use socksgate::config::{load_config, Config, LogFormat};
use socksgate::run_daemon;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "/etc/socksgate.toml";

/// Socksgate - SOCKS4/4a/5 proxy with an outgoing address pool
#[derive(Parser, Debug)]
#[command(name = "socksgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path) = match &args.config {
        Some(path) => (load_config(path)?, Some(path.clone())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => (
            load_config(DEFAULT_CONFIG_PATH)?,
            Some(PathBuf::from(DEFAULT_CONFIG_PATH)),
        ),
        None => (Config::default(), None),
    };

    // Setup logging
    let level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let json = args.json_log || config.log.format == LogFormat::Json;
    setup_logging(level, json)?;

    info!("Socksgate v{}", socksgate::VERSION);
    match &config_path {
        Some(path) => info!("Configuration loaded from: {:?}", path),
        None => info!("No configuration file, using defaults"),
    }
    info!("Listening port: {}", config.incoming.port);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?
    };
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            // On Windows, only handle Ctrl+C
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    // Run the proxy
    run_daemon(config, shutdown_rx).await
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
