//! Sequenced routine player
//!
//! Drives intro tone → narration → outro tone for one routine at a time and
//! reports a single transport status across the three assets.
//!
//! **Concurrency model:**
//! - The session lives behind a tokio `Mutex`; every public operation takes it.
//! - Backend completion callbacks post `StageEvent`s to an unbounded channel.
//!   A driver task (holding only a `Weak` reference) applies them.
//! - Every session carries the player generation that was live when it was
//!   created. Stop and play retire the generation, so callbacks from replaced
//!   sessions no longer match and are dropped.
//! - The outro tone is loaded by a detached task. Its handle is parked in a
//!   registry outside the session so that stop (or the next play) can cancel
//!   it, but it is never reachable from pause/resume/seek.

use crate::audio::{AudioBackend, AudioHandle, BackendKind, OnComplete};
use crate::playback::events::StageEvent;
use crate::playback::session::{PlaybackSession, PlaybackStatus};
use crate::playback::StageAssets;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wub_common::events::{EventBus, PlaybackState, Stage, WubEvent};
use wub_common::Routine;

type OutroRegistry = std::sync::Mutex<HashMap<u64, Box<dyn AudioHandle>>>;

/// Consistent view of the player for API responses and progress events
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    #[serde(flatten)]
    pub status: PlaybackStatus,
    pub stage: Stage,
    pub is_playing: bool,
    pub session_id: Option<Uuid>,
    pub routine_id: Option<String>,
}

/// Single-session routine player
///
/// Construct once at the composition root and share via `Arc`.
pub struct SequencedAudioPlayer {
    backend: Arc<dyn AudioBackend>,
    assets: StageAssets,
    events: EventBus,
    session: Mutex<Option<PlaybackSession>>,
    /// Live generation; bumped whenever sessions are retired
    generation: Arc<AtomicU64>,
    /// Detached outro handles by generation
    outros: Arc<OutroRegistry>,
    stage_tx: mpsc::UnboundedSender<StageEvent>,
}

impl SequencedAudioPlayer {
    /// Create the player and spawn its stage driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Arc<dyn AudioBackend>, assets: StageAssets, events: EventBus) -> Arc<Self> {
        let (stage_tx, stage_rx) = mpsc::unbounded_channel();

        let player = Arc::new(Self {
            backend,
            assets,
            events,
            session: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            outros: Arc::new(std::sync::Mutex::new(HashMap::new())),
            stage_tx,
        });

        tokio::spawn(run_stage_driver(Arc::downgrade(&player), stage_rx));
        player
    }

    /// One-time backend setup. Failures are logged; playback is attempted anyway.
    pub async fn initialize(&self) {
        match self.backend.initialize().await {
            Ok(()) => info!("Audio backend initialized ({})", self.backend.kind()),
            Err(e) => warn!("Audio backend initialization failed, continuing: {}", e),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Tear down any current session and start `routine` with its intro tone.
    ///
    /// Returns true once the intro tone is playing, false if it could not be
    /// loaded (no session remains in that case).
    pub async fn play_routine(&self, routine: &Routine) -> bool {
        let mut slot = self.session.lock().await;
        let generation = self.teardown(&mut slot);

        let mut session = PlaybackSession::new(generation, routine.clone());
        session.advance(Stage::PlayingIntroTone);

        let intro_path = self.assets.intro_path();
        let on_complete = self.completion_callback(generation, Stage::PlayingIntroTone);

        let handle = match self
            .backend
            .load_and_play(&intro_path, self.assets.intro_volume, on_complete)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    "Failed to start routine '{}': intro tone {}: {}",
                    routine.id,
                    intro_path.display(),
                    e
                );
                self.emit(WubEvent::PlaybackFailed {
                    routine_id: routine.id.clone(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return false;
            }
        };

        session.attach(handle);
        session.set_playing(true);
        let session_id = session.id;
        *slot = Some(session);
        drop(slot);

        info!(
            "Started routine '{}' ({}), session {}",
            routine.title, routine.id, session_id
        );
        self.emit(WubEvent::RoutineStarted {
            session_id,
            routine_id: routine.id.clone(),
            title: routine.title.clone(),
            timestamp: Utc::now(),
        });
        self.emit(WubEvent::StageChanged {
            session_id,
            stage: Stage::PlayingIntroTone,
            timestamp: Utc::now(),
        });

        true
    }

    /// Pause the active intro or narration asset.
    ///
    /// No-op when nothing is playing or the outro is running.
    pub async fn pause(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.as_mut() else {
            return;
        };
        if !session.is_playing() || !session.stage().is_controllable() {
            return;
        }

        if let Some(handle) = session.handle() {
            if let Err(e) = handle.pause() {
                warn!("Pause failed: {}", e);
                return;
            }
        }

        session.set_playing(false);
        let session_id = session.id;
        drop(slot);

        debug!("Paused session {}", session_id);
        self.emit_state_change(session_id, PlaybackState::Playing, PlaybackState::Paused);
    }

    /// Resume a paused intro or narration asset from its retained position.
    pub async fn resume(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.as_mut() else {
            return;
        };
        if session.is_playing() || !session.stage().is_controllable() {
            return;
        }

        if let Some(handle) = session.handle() {
            if let Err(e) = handle.resume() {
                warn!("Resume failed: {}", e);
                return;
            }
        }

        session.set_playing(true);
        let session_id = session.id;
        drop(slot);

        debug!("Resumed session {}", session_id);
        self.emit_state_change(session_id, PlaybackState::Paused, PlaybackState::Playing);
    }

    /// Halt and release the session and any outro tone. Idempotent.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        self.teardown(&mut slot);
    }

    /// Seek to an absolute position on the combined timeline.
    ///
    /// Only the active stage's asset is moved: the target is converted to a
    /// stage-local position and clamped to that asset's own bounds. Returns the
    /// absolute position applied, or None when nothing is seekable.
    pub async fn set_position(&self, position_ms: u64) -> Option<u64> {
        let slot = self.session.lock().await;
        let session = slot.as_ref()?;
        if !session.stage().is_controllable() {
            return None;
        }
        let handle = session.handle()?;

        let offset = session.stage_offset_ms();
        let local = position_ms.saturating_sub(offset);

        match handle.seek(local) {
            Ok(applied) => {
                debug!(
                    "Seek to {}ms applied as {}ms in {}",
                    position_ms,
                    applied,
                    session.stage()
                );
                Some(offset + applied)
            }
            Err(e) => {
                warn!("Seek failed: {}", e);
                None
            }
        }
    }

    /// Seek relative to the current position, clamped to the timeline
    pub async fn seek_by(&self, offset_ms: i64) -> Option<u64> {
        let status = self.get_status().await;
        if !status.is_loaded {
            return None;
        }

        let target = (status.position_ms as i64)
            .saturating_add(offset_ms)
            .clamp(0, status.duration_ms as i64) as u64;
        self.set_position(target).await
    }

    pub async fn get_status(&self) -> PlaybackStatus {
        self.session
            .lock()
            .await
            .as_ref()
            .map(PlaybackSession::status)
            .unwrap_or_else(PlaybackStatus::idle)
    }

    pub async fn get_is_playing(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(PlaybackSession::is_playing)
    }

    /// Current stage, `Idle` when no session exists
    pub async fn stage(&self) -> Stage {
        self.session
            .lock()
            .await
            .as_ref()
            .map(PlaybackSession::stage)
            .unwrap_or(Stage::Idle)
    }

    pub async fn current_routine(&self) -> Option<Routine> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.routine.clone())
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) => PlaybackSnapshot {
                status: session.status(),
                stage: session.stage(),
                is_playing: session.is_playing(),
                session_id: Some(session.id),
                routine_id: Some(session.routine.id.clone()),
            },
            None => PlaybackSnapshot {
                status: PlaybackStatus::idle(),
                stage: Stage::Idle,
                is_playing: false,
                session_id: None,
                routine_id: None,
            },
        }
    }

    /// Release the current session and every outro tone, retiring the live
    /// generation. Returns the new live generation.
    fn teardown(&self, slot: &mut Option<PlaybackSession>) -> u64 {
        let generation = {
            let mut outros = self.lock_outros();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            for (_, handle) in outros.drain() {
                if let Err(e) = handle.stop() {
                    warn!("Failed to stop outro tone: {}", e);
                }
            }
            generation
        };

        if let Some(mut session) = slot.take() {
            session.release_handle();
            info!("Stopped session {} ({})", session.id, session.routine.id);
            self.emit(WubEvent::PlaybackStopped {
                session_id: session.id,
                timestamp: Utc::now(),
            });
        }

        generation
    }

    fn completion_callback(&self, generation: u64, stage: Stage) -> OnComplete {
        let tx = self.stage_tx.clone();
        Box::new(move || {
            let _ = tx.send(StageEvent::StageComplete { generation, stage });
        })
    }

    async fn handle_stage_event(&self, event: StageEvent) {
        match event {
            StageEvent::StageComplete { generation, stage } => match stage {
                Stage::PlayingIntroTone => self.on_intro_complete(generation).await,
                Stage::PlayingNarration => self.on_narration_complete(generation).await,
                Stage::PlayingOutroTone => self.on_outro_complete(generation).await,
                other => debug!("Ignoring completion for stage {}", other),
            },
        }
    }

    /// Intro tone ended: release it and start the narration.
    async fn on_intro_complete(&self, generation: u64) {
        let (session_id, narration_path) = {
            let mut slot = self.session.lock().await;
            let Some(session) = live_session(&mut slot, generation, Stage::PlayingIntroTone) else {
                debug!("Discarding stale intro completion (generation {})", generation);
                return;
            };

            session.advance(Stage::PlayingNarration);
            (session.id, self.assets.narration_path(&session.routine))
        };

        self.emit(WubEvent::StageChanged {
            session_id,
            stage: Stage::PlayingNarration,
            timestamp: Utc::now(),
        });

        let on_complete = self.completion_callback(generation, Stage::PlayingNarration);
        let loaded = self
            .backend
            .load_and_play(&narration_path, self.assets.narration_volume, on_complete)
            .await;

        let mut slot = self.session.lock().await;
        let still_live = live_session(&mut slot, generation, Stage::PlayingNarration)
            .is_some_and(|s| !s.has_handle());

        match (loaded, still_live) {
            (Ok(handle), true) => {
                let Some(session) = slot.as_mut() else {
                    return;
                };
                if !session.is_playing() {
                    // Paused while the narration was loading
                    if let Err(e) = handle.pause() {
                        warn!("Pause failed: {}", e);
                    }
                }
                session.attach(handle);
                info!("Narration started for session {}", session_id);
            }
            (Ok(handle), false) => {
                debug!("Session replaced while narration loaded, releasing it");
                if let Err(e) = handle.stop() {
                    warn!("Failed to stop narration: {}", e);
                }
            }
            (Err(e), true) => {
                error!("Failed to load narration {}: {}", narration_path.display(), e);
                if let Some(session) = slot.take() {
                    self.emit(WubEvent::PlaybackFailed {
                        routine_id: session.routine.id.clone(),
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            (Err(e), false) => {
                debug!("Narration load failed for a replaced session: {}", e);
            }
        }
    }

    /// Narration ended: the controllable routine is over. Fire the outro
    /// tone as detached playback.
    async fn on_narration_complete(&self, generation: u64) {
        let session_id = {
            let mut slot = self.session.lock().await;
            let Some(session) = live_session(&mut slot, generation, Stage::PlayingNarration) else {
                debug!(
                    "Discarding stale narration completion (generation {})",
                    generation
                );
                return;
            };

            session.advance(Stage::PlayingOutroTone);
            session.set_playing(false);
            session.id
        };

        info!("Narration finished for session {}, playing outro", session_id);
        self.emit(WubEvent::StageChanged {
            session_id,
            stage: Stage::PlayingOutroTone,
            timestamp: Utc::now(),
        });

        let backend = Arc::clone(&self.backend);
        let live_generation = Arc::clone(&self.generation);
        let outros = Arc::clone(&self.outros);
        let stage_tx = self.stage_tx.clone();
        let path = self.assets.intro_path();
        let volume = self.assets.outro_volume;
        let on_complete = self.completion_callback(generation, Stage::PlayingOutroTone);

        tokio::spawn(async move {
            match backend.load_and_play(&path, volume, on_complete).await {
                Ok(handle) => {
                    let mut outros = outros.lock().unwrap_or_else(PoisonError::into_inner);
                    if live_generation.load(Ordering::SeqCst) == generation {
                        outros.insert(generation, handle);
                    } else {
                        debug!("Outro tone outlived its session, releasing it");
                        if let Err(e) = handle.stop() {
                            warn!("Failed to stop outro tone: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Outro tone failed, finishing routine without it: {}", e);
                    let _ = stage_tx.send(StageEvent::StageComplete {
                        generation,
                        stage: Stage::PlayingOutroTone,
                    });
                }
            }
        });
    }

    /// Outro tone ended (or never started): the routine is finished.
    async fn on_outro_complete(&self, generation: u64) {
        let mut slot = self.session.lock().await;

        // Retire the generation under the registry lock so a late outro
        // insertion sees the mismatch.
        let live = {
            let mut outros = self.lock_outros();
            outros.remove(&generation);
            self.generation
                .compare_exchange(
                    generation,
                    generation + 1,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
        };

        if !live || live_session(&mut slot, generation, Stage::PlayingOutroTone).is_none() {
            debug!("Discarding stale outro completion (generation {})", generation);
            return;
        }

        let Some(mut session) = slot.take() else {
            return;
        };
        drop(slot);

        session.advance(Stage::Finished);
        info!(
            "Routine '{}' completed, session {}",
            session.routine.id, session.id
        );
        self.emit(WubEvent::StageChanged {
            session_id: session.id,
            stage: Stage::Finished,
            timestamp: Utc::now(),
        });
        self.emit(WubEvent::RoutineCompleted {
            session_id: session.id,
            routine_id: session.routine.id.clone(),
            timestamp: Utc::now(),
        });
    }

    fn emit_state_change(&self, session_id: Uuid, old_state: PlaybackState, new_state: PlaybackState) {
        self.emit(WubEvent::PlaybackStateChanged {
            session_id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: WubEvent) {
        self.events.emit_lossy(event);
    }

    fn lock_outros(&self) -> MutexGuard<'_, HashMap<u64, Box<dyn AudioHandle>>> {
        self.outros.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn live_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// The session in `slot`, if it belongs to `generation` and is in `stage`
fn live_session(
    slot: &mut Option<PlaybackSession>,
    generation: u64,
    stage: Stage,
) -> Option<&mut PlaybackSession> {
    slot.as_mut()
        .filter(|s| s.generation == generation && s.stage() == stage)
}

/// Apply backend completions until the player is dropped
async fn run_stage_driver(
    player: Weak<SequencedAudioPlayer>,
    mut stage_rx: mpsc::UnboundedReceiver<StageEvent>,
) {
    while let Some(event) = stage_rx.recv().await {
        let Some(player) = player.upgrade() else {
            break;
        };
        player.handle_stage_event(event).await;
    }
    debug!("Stage driver exiting");
}
