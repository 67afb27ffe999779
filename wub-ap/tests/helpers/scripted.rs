//! Backend double with switchable transport faults
//!
//! Wraps the headless backend. Each transport call can be made to fail, and
//! an optional gate holds every load until the test releases it.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use wub_ap::audio::{
    AudioBackend, AudioHandle, BackendKind, DurationProbe, HeadlessBackend, OnComplete,
};
use wub_ap::playback::SequencedAudioPlayer;
use wub_ap::{Error, Result};
use wub_common::events::EventBus;

use super::fixtures::assets;

#[derive(Default)]
pub struct TransportFaults {
    pub initialize: AtomicBool,
    pub pause: AtomicBool,
    pub resume: AtomicBool,
    pub seek: AtomicBool,
}

impl TransportFaults {
    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::AudioOutput(format!("{} rejected by device", operation)))
        } else {
            Ok(())
        }
    }
}

pub struct ScriptedBackend {
    inner: HeadlessBackend,
    pub faults: Arc<TransportFaults>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new(probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            inner: HeadlessBackend::new(probe),
            faults: Arc::new(TransportFaults::default()),
            gate: None,
        }
    }

    /// Hold each load until `gate` is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl AudioBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    async fn initialize(&self) -> Result<()> {
        TransportFaults::check(&self.faults.initialize, "initialize")
    }

    async fn load_and_play(
        &self,
        path: &Path,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<Box<dyn AudioHandle>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let inner = self.inner.load_and_play(path, volume, on_complete).await?;
        Ok(Box::new(ScriptedHandle {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct ScriptedHandle {
    inner: Box<dyn AudioHandle>,
    faults: Arc<TransportFaults>,
}

impl AudioHandle for ScriptedHandle {
    fn pause(&self) -> Result<()> {
        TransportFaults::check(&self.faults.pause, "pause")?;
        self.inner.pause()
    }

    fn resume(&self) -> Result<()> {
        TransportFaults::check(&self.faults.resume, "resume")?;
        self.inner.resume()
    }

    fn seek(&self, position_ms: u64) -> Result<u64> {
        TransportFaults::check(&self.faults.seek, "seek")?;
        self.inner.seek(position_ms)
    }

    fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    fn position_ms(&self) -> u64 {
        self.inner.position_ms()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.inner.duration_ms()
    }
}

/// Player over `backend`, returning the player and its event bus
pub fn scripted_player(backend: ScriptedBackend) -> (Arc<SequencedAudioPlayer>, EventBus) {
    let events = EventBus::new(256);
    let backend: Arc<dyn AudioBackend> = Arc::new(backend);
    let player = SequencedAudioPlayer::new(backend, assets(), events.clone());
    (player, events)
}
