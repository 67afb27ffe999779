//! Routine playback: session bookkeeping, the sequenced player and its
//! background progress task

pub mod events;
pub mod monitor;
pub mod player;
pub mod session;

pub use monitor::start_monitoring;
pub use player::{PlaybackSnapshot, SequencedAudioPlayer};
pub use session::{PlaybackSession, PlaybackStatus};

use std::path::PathBuf;
use wub_common::config::resolve_asset;
use wub_common::Routine;

/// Tone asset and per-stage volumes shared by every routine
#[derive(Debug, Clone)]
pub struct StageAssets {
    pub assets_folder: PathBuf,
    /// Bowl tone played as both intro and outro
    pub intro_tone: PathBuf,
    pub intro_volume: f32,
    pub narration_volume: f32,
    pub outro_volume: f32,
}

impl StageAssets {
    pub fn intro_path(&self) -> PathBuf {
        resolve_asset(&self.assets_folder, &self.intro_tone)
    }

    pub fn narration_path(&self, routine: &Routine) -> PathBuf {
        resolve_asset(&self.assets_folder, &routine.narration)
    }
}
