//! Headless audio backend
//!
//! Produces no sound. Each handle runs a virtual clock that advances in real
//! (tokio) time while playing, and fires its completion callback once the
//! clock reaches the asset duration. Durations come from a `DurationProbe`,
//! which reads container metadata in production and a fixed table in tests.
//!
//! Used on hosts without an output device and throughout the test suite,
//! where `tokio::time::pause` makes stage timing deterministic.

use crate::audio::backend::{AudioBackend, AudioHandle, BackendKind, OnComplete};
use crate::audio::decoder::SimpleDecoder;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Source of asset durations for the headless backend
pub trait DurationProbe: Send + Sync {
    fn duration_ms(&self, path: &Path) -> Result<u64>;
}

impl<F> DurationProbe for F
where
    F: Fn(&Path) -> Result<u64> + Send + Sync,
{
    fn duration_ms(&self, path: &Path) -> Result<u64> {
        self(path)
    }
}

/// Reads durations from the asset files themselves
pub struct SymphoniaProbe;

impl DurationProbe for SymphoniaProbe {
    fn duration_ms(&self, path: &Path) -> Result<u64> {
        SimpleDecoder::probe_duration_ms(path)
    }
}

/// Clock-driven backend with no audio output
pub struct HeadlessBackend {
    probe: Arc<dyn DurationProbe>,
    active: Arc<AtomicUsize>,
}

impl HeadlessBackend {
    pub fn new(probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            probe,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of handles created and not yet stopped or dropped
    pub fn active_handles(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    async fn initialize(&self) -> Result<()> {
        debug!("Headless backend ready");
        Ok(())
    }

    async fn load_and_play(
        &self,
        path: &Path,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<Box<dyn AudioHandle>> {
        // Probing may read or decode the whole file
        let probe = Arc::clone(&self.probe);
        let probe_path = path.to_path_buf();
        let duration_ms = tokio::task::spawn_blocking(move || probe.duration_ms(&probe_path))
            .await
            .map_err(|e| Error::Internal(format!("Duration probe task failed: {}", e)))??;

        debug!(
            "Headless playback of {} ({}ms, volume {:.2})",
            path.display(),
            duration_ms,
            volume
        );

        let shared = Arc::new(Shared {
            clock: Mutex::new(Clock {
                offset_ms: 0,
                anchor: Some(Instant::now()),
                duration_ms,
                done: false,
            }),
            wake: Notify::new(),
            released: AtomicBool::new(false),
        });

        self.active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(run_clock(Arc::clone(&shared), on_complete));

        Ok(Box::new(HeadlessHandle {
            shared,
            active: Arc::clone(&self.active),
        }))
    }
}

struct Clock {
    /// Position accumulated before `anchor`
    offset_ms: u64,
    /// Set while playing
    anchor: Option<Instant>,
    duration_ms: u64,
    /// Completion has fired
    done: bool,
}

impl Clock {
    fn position(&self, now: Instant) -> u64 {
        let running = self
            .anchor
            .map(|anchor| now.saturating_duration_since(anchor).as_millis() as u64)
            .unwrap_or(0);
        (self.offset_ms + running).min(self.duration_ms)
    }
}

struct Shared {
    clock: Mutex<Clock>,
    wake: Notify,
    released: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleep until the clock runs out, waking early whenever a control call
/// changes the clock.
async fn run_clock(shared: Arc<Shared>, on_complete: OnComplete) {
    loop {
        let remaining = {
            let mut clock = shared.lock();
            if shared.released.load(Ordering::SeqCst) {
                trace!("Headless clock released before completion");
                return;
            }

            match clock.anchor {
                Some(_) => {
                    let position = clock.position(Instant::now());
                    if position >= clock.duration_ms {
                        clock.offset_ms = clock.duration_ms;
                        clock.anchor = None;
                        clock.done = true;
                        break;
                    }
                    Some(clock.duration_ms - position)
                }
                None => None,
            }
        };

        match remaining {
            Some(ms) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }

    trace!("Headless clock reached end");
    on_complete();
}

/// Handle to one headless asset
pub struct HeadlessHandle {
    shared: Arc<Shared>,
    active: Arc<AtomicUsize>,
}

impl HeadlessHandle {
    fn release(&self) {
        let _clock = self.shared.lock();
        if !self.shared.released.swap(true, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.shared.wake.notify_one();
        }
    }
}

impl AudioHandle for HeadlessHandle {
    fn pause(&self) -> Result<()> {
        let mut clock = self.shared.lock();
        if clock.anchor.is_some() {
            clock.offset_ms = clock.position(Instant::now());
            clock.anchor = None;
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        let mut clock = self.shared.lock();
        if clock.anchor.is_none() && !clock.done && !self.shared.released.load(Ordering::SeqCst) {
            clock.anchor = Some(Instant::now());
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    fn seek(&self, position_ms: u64) -> Result<u64> {
        let mut clock = self.shared.lock();
        if clock.done {
            return Ok(clock.duration_ms);
        }

        let applied = position_ms.min(clock.duration_ms);
        clock.offset_ms = applied;
        if clock.anchor.is_some() {
            clock.anchor = Some(Instant::now());
        }
        self.shared.wake.notify_one();
        Ok(applied)
    }

    fn stop(&self) -> Result<()> {
        self.release();
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.shared.lock().position(Instant::now())
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(self.shared.lock().duration_ms)
    }
}

impl Drop for HeadlessHandle {
    fn drop(&mut self) {
        self.release();
    }
}
