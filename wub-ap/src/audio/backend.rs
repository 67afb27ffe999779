//! Audio backend contract
//!
//! The player drives every stage through one interface regardless of which
//! platform primitive produces the sound:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │        SequencedAudioPlayer              │
//! │  intro tone → narration → outro tone     │
//! └──────────────────┬───────────────────────┘
//!                    │ trait AudioBackend / AudioHandle
//!          ┌─────────┴──────────┐
//!          ▼                    ▼
//!   ┌──────────────┐     ┌──────────────┐
//!   │ Device       │     │ Headless     │
//!   │ cpal output  │     │ virtual clock│
//!   └──────────────┘     └──────────────┘
//! ```

use crate::audio::device::DeviceBackend;
use crate::audio::headless::{HeadlessBackend, SymphoniaProbe};
use crate::config::BackendChoice;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Callback invoked exactly once when an asset plays to its natural end.
///
/// Never invoked after `AudioHandle::stop`.
pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

/// Backend implementation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Device,
    Headless,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Device => write!(f, "device"),
            BackendKind::Headless => write!(f, "headless"),
        }
    }
}

/// Platform audio primitive factory
#[async_trait]
pub trait AudioBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// One-time setup (device probing, session configuration)
    async fn initialize(&self) -> Result<()>;

    /// Create a playback primitive for `path` and start it immediately.
    ///
    /// Fails with `Error::AssetLoad`/`Error::Decode`/`Error::AudioOutput` when
    /// the asset cannot be created.
    async fn load_and_play(
        &self,
        path: &Path,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<Box<dyn AudioHandle>>;
}

/// Exclusively owned handle to one playing asset
///
/// Dropping a handle releases it as if `stop` had been called.
pub trait AudioHandle: Send + Sync {
    fn pause(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    /// Move to `position_ms`, clamped to the asset's own bounds.
    ///
    /// Returns the position actually applied.
    fn seek(&self, position_ms: u64) -> Result<u64>;

    /// Halt and release. Idempotent.
    fn stop(&self) -> Result<()>;

    /// Elapsed position within this asset
    fn position_ms(&self) -> u64;

    /// Asset duration, once known
    fn duration_ms(&self) -> Option<u64>;
}

/// Construct the backend selected by configuration.
///
/// `Auto` picks the device backend when the host exposes a default output
/// device and falls back to the headless backend otherwise.
pub fn create_backend(choice: BackendChoice, device_name: Option<String>) -> Arc<dyn AudioBackend> {
    let kind = match choice {
        BackendChoice::Device => BackendKind::Device,
        BackendChoice::Headless => BackendKind::Headless,
        BackendChoice::Auto => {
            if DeviceBackend::has_output_device() {
                BackendKind::Device
            } else {
                warn!("No audio output device available, using headless backend");
                BackendKind::Headless
            }
        }
    };

    info!("Audio backend: {}", kind);

    match kind {
        BackendKind::Device => Arc::new(DeviceBackend::new(device_name)),
        BackendKind::Headless => Arc::new(HeadlessBackend::new(Arc::new(SymphoniaProbe))),
    }
}
