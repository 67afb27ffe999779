//! Headless player fixtures
//!
//! Asset durations come from a fixed table keyed by file name, so tests run
//! without audio files. Combine with `start_paused` tokio tests for
//! deterministic stage timing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use wub_ap::audio::{AudioBackend, DurationProbe, HeadlessBackend};
use wub_ap::playback::{SequencedAudioPlayer, StageAssets};
use wub_ap::{Error, Result};
use wub_common::events::{EventBus, WubEvent};
use wub_common::Routine;

pub const INTRO_MS: u64 = 3_000;
pub const NARRATION_MS: u64 = 10_000;
pub const ROUTINE_MS: u64 = 2 * INTRO_MS + NARRATION_MS;

pub struct PlayerFixture {
    pub player: Arc<SequencedAudioPlayer>,
    pub backend: Arc<HeadlessBackend>,
    pub events: EventBus,
}

/// Routine whose narration is `<id>.mp3`
pub fn routine(id: &str) -> Routine {
    Routine {
        id: id.to_string(),
        title: format!("Routine {}", id),
        duration: "1 min".to_string(),
        description: String::new(),
        narration: PathBuf::from(format!("{}.mp3", id)),
        transcript: String::new(),
    }
}

pub fn assets() -> StageAssets {
    StageAssets {
        assets_folder: PathBuf::from("/wub-test-assets"),
        intro_tone: PathBuf::from("bowl.mp3"),
        intro_volume: 0.5,
        narration_volume: 1.0,
        outro_volume: 0.5,
    }
}

/// Probe answering from `table`; unknown files fail to load
pub fn fixed_durations(table: &[(&str, u64)]) -> Arc<dyn DurationProbe> {
    let table: HashMap<String, u64> = table
        .iter()
        .map(|(name, ms)| (name.to_string(), *ms))
        .collect();

    Arc::new(move |path: &Path| -> Result<u64> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| table.get(name).copied())
            .ok_or_else(|| Error::AssetLoad(format!("No such asset: {}", path.display())))
    })
}

/// Player over a headless backend knowing `bowl.mp3`, `r1.mp3` and `r2.mp3`
pub fn headless_player() -> PlayerFixture {
    headless_player_with(&[
        ("bowl.mp3", INTRO_MS),
        ("r1.mp3", NARRATION_MS),
        ("r2.mp3", NARRATION_MS),
    ])
}

pub fn headless_player_with(table: &[(&str, u64)]) -> PlayerFixture {
    headless_player_from(fixed_durations(table))
}

pub fn headless_player_from(probe: Arc<dyn DurationProbe>) -> PlayerFixture {
    let backend = Arc::new(HeadlessBackend::new(probe));
    let events = EventBus::new(256);
    let dyn_backend: Arc<dyn AudioBackend> = backend.clone();
    let player = SequencedAudioPlayer::new(dyn_backend, assets(), events.clone());

    PlayerFixture {
        player,
        backend,
        events,
    }
}

/// Everything received so far, without waiting
pub fn drain_events(rx: &mut broadcast::Receiver<WubEvent>) -> Vec<WubEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
