//! WakeUp Buddy Audio Player (wub-ap) - Main entry point
//!
//! Loads configuration, selects an audio backend, and serves the routine
//! player's control API.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wub_ap::alarm::AlarmScheduler;
use wub_ap::api::{self, AppState};
use wub_ap::audio::create_backend;
use wub_ap::config::{BackendChoice, Config, LoggingConfig, Overrides, TomlConfig};
use wub_ap::playback::{start_monitoring, SequencedAudioPlayer};
use wub_common::config::locate_config_file;
use wub_common::events::EventBus;

/// Command-line arguments for wub-ap
#[derive(Parser, Debug)]
#[command(name = "wub-ap")]
#[command(about = "WakeUp Buddy routine audio player")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "WUB_PORT")]
    port: Option<u16>,

    /// Folder holding tones and narrations
    #[arg(short, long, env = "WUB_ASSETS_FOLDER")]
    assets_folder: Option<PathBuf>,

    /// Audio backend
    #[arg(short, long, env = "WUB_BACKEND", value_enum)]
    backend: Option<BackendChoice>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref());
    let toml_config =
        TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&toml_config.logging)?;

    match &config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }

    let config = Config::resolve(
        toml_config,
        Overrides {
            port: args.port,
            assets_folder: args.assets_folder,
            backend: args.backend,
        },
    )
    .context("Invalid configuration")?;

    info!("Starting WakeUp Buddy Audio Player on port {}", config.port);
    info!("Assets folder: {}", config.assets.assets_folder.display());
    info!("{} routine(s) available", config.catalog.len());

    let events = EventBus::new(config.event_capacity);
    let backend = create_backend(config.backend, config.device_name.clone());

    let player = SequencedAudioPlayer::new(backend, config.assets.clone(), events.clone());
    player.initialize().await;

    let _monitor = start_monitoring(&player, config.progress_interval);
    let alarm = Arc::new(AlarmScheduler::new(Arc::clone(&player)));

    let state = AppState {
        player: Arc::clone(&player),
        alarm,
        catalog: Arc::new(config.catalog.clone()),
        events,
    };

    api::server::run(config.port, state, shutdown_signal())
        .await
        .context("Server error")?;

    player.stop().await;
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr, and additionally to `logging.file` when configured.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let level = &logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("wub_ap={level},wub_common={level},tower_http={level}").into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
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
