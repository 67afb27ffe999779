//! Configuration management for the wub-ap audio player
//!
//! Two tiers:
//! 1. **TOML bootstrap file**: port, assets, backend, volumes, logging and an
//!    optional routine catalog. Read once at startup.
//! 2. **Command line / environment**: clap arguments override TOML values.
//!
//! A missing configuration file is not an error; built-in defaults apply.
//! A malformed file is reported as `Error::Config`.

use crate::error::{Error, Result};
use crate::playback::StageAssets;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use wub_common::config::{resolve_assets_folder, ASSETS_FOLDER_ENV_VAR};
use wub_common::{Routine, RoutineCatalog};

/// Which audio backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Device output when the host has a default output device, headless otherwise
    #[default]
    Auto,
    /// Audible playback through the system output device
    Device,
    /// Silent clock-driven playback
    Headless,
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Folder holding tones and narrations
    pub assets_folder: Option<PathBuf>,

    /// Audio backend selection
    pub backend: BackendChoice,

    /// Output device name (None = system default)
    pub device_name: Option<String>,

    /// Bowl tone played before and after each routine
    pub intro_tone: PathBuf,

    pub intro_volume: f32,
    pub narration_volume: f32,
    pub outro_volume: f32,

    /// PlaybackProgress emission interval
    pub progress_interval_ms: u64,

    /// EventBus channel capacity
    pub event_capacity: usize,

    pub logging: LoggingConfig,

    /// Routine catalog; empty means the built-in catalog
    pub routines: Vec<Routine>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5730,
            assets_folder: None,
            backend: BackendChoice::Auto,
            device_name: None,
            intro_tone: PathBuf::from("Tibetan Bowl Sound 1.mp3"),
            intro_volume: 0.8,
            narration_volume: 1.0,
            outro_volume: 0.7,
            progress_interval_ms: 300,
            event_capacity: 100,
            logging: LoggingConfig::default(),
            routines: Vec::new(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from an optional file path.
    ///
    /// - `None`: built-in defaults
    /// - missing file: warning + built-in defaults
    /// - unreadable or malformed file: `Error::Config`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No configuration file, using built-in defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Command-line overrides applied on top of the TOML file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub assets_folder: Option<PathBuf>,
    pub backend: Option<BackendChoice>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendChoice,
    pub device_name: Option<String>,
    pub assets: StageAssets,
    pub progress_interval: Duration,
    pub event_capacity: usize,
    pub logging: LoggingConfig,
    pub catalog: RoutineCatalog,
}

impl Config {
    /// Merge TOML values with command-line overrides and validate.
    ///
    /// Volumes are clamped to 0.0-1.0 and the progress interval to 50-5000ms.
    pub fn resolve(toml: TomlConfig, overrides: Overrides) -> Result<Self> {
        let assets_folder = resolve_assets_folder(
            overrides.assets_folder.as_deref(),
            ASSETS_FOLDER_ENV_VAR,
            toml.assets_folder.as_deref(),
        );

        let catalog = if toml.routines.is_empty() {
            RoutineCatalog::builtin()
        } else {
            RoutineCatalog::new(toml.routines)?
        };

        let assets = StageAssets {
            assets_folder,
            intro_tone: toml.intro_tone,
            intro_volume: clamp_volume("intro_volume", toml.intro_volume),
            narration_volume: clamp_volume("narration_volume", toml.narration_volume),
            outro_volume: clamp_volume("outro_volume", toml.outro_volume),
        };

        let interval_ms = toml.progress_interval_ms.clamp(50, 5000);
        if interval_ms != toml.progress_interval_ms {
            warn!(
                "progress_interval_ms {} out of range, clamped to {}",
                toml.progress_interval_ms, interval_ms
            );
        }

        Ok(Self {
            port: overrides.port.unwrap_or(toml.port),
            backend: overrides.backend.unwrap_or(toml.backend),
            device_name: toml.device_name,
            assets,
            progress_interval: Duration::from_millis(interval_ms),
            event_capacity: toml.event_capacity.max(1),
            logging: toml.logging,
            catalog,
        })
    }
}

fn clamp_volume(name: &str, value: f32) -> f32 {
    let clamped = if value.is_nan() { 1.0 } else { value.clamp(0.0, 1.0) };
    if clamped != value {
        warn!("{} {} out of range, clamped to {}", name, value, clamped);
    }
    clamped
}
