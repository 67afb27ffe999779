//! Routine playback session
//!
//! Holds the stage, measured stage durations and the single active backend
//! handle of one routine playback, and derives the combined-timeline status
//! from them. Pure bookkeeping: all backend calls besides releasing a handle
//! are made by the player.

use crate::audio::AudioHandle;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;
use wub_common::events::Stage;
use wub_common::Routine;

/// Transport status on the combined intro + narration + outro timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    /// False when no session exists
    pub is_loaded: bool,
    pub position_ms: u64,
    /// Grows as stage durations become known
    pub duration_ms: u64,
}

impl PlaybackStatus {
    /// Status reported when no session exists
    pub fn idle() -> Self {
        Self {
            is_loaded: false,
            position_ms: 0,
            duration_ms: 0,
        }
    }
}

/// One routine playback, owned exclusively by the player
pub struct PlaybackSession {
    /// Identifier reported in events
    pub id: Uuid,
    /// Player generation this session belongs to
    pub generation: u64,
    pub routine: Routine,
    stage: Stage,
    intro_duration_ms: Option<u64>,
    narration_duration_ms: Option<u64>,
    handle: Option<Box<dyn AudioHandle>>,
    is_playing: bool,
}

impl PlaybackSession {
    pub fn new(generation: u64, routine: Routine) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            routine,
            stage: Stage::Idle,
            intro_duration_ms: None,
            narration_duration_ms: None,
            handle: None,
            is_playing: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    /// Handle of the active intro or narration asset
    pub fn handle(&self) -> Option<&dyn AudioHandle> {
        self.handle.as_deref()
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Move forward to `next`, releasing the current stage's handle.
    ///
    /// The released stage's duration is re-measured from its handle before
    /// release. Returns false (and changes nothing) when `next` does not lie
    /// after the current stage.
    pub fn advance(&mut self, next: Stage) -> bool {
        if !self.stage.can_advance_to(next) {
            return false;
        }

        if let Some(duration_ms) = self.handle.as_ref().and_then(|h| h.duration_ms()) {
            self.record_duration(self.stage, duration_ms);
        }
        self.release_handle();
        self.stage = next;
        true
    }

    /// Install the freshly loaded handle for the current stage.
    ///
    /// Any handle already present is released first.
    pub fn attach(&mut self, handle: Box<dyn AudioHandle>) {
        self.release_handle();
        if let Some(duration_ms) = handle.duration_ms() {
            self.record_duration(self.stage, duration_ms);
        }
        self.handle = Some(handle);
    }

    /// Store the measured duration of `stage`'s asset.
    ///
    /// The outro has no slot of its own; it reuses the intro duration.
    pub fn record_duration(&mut self, stage: Stage, duration_ms: u64) {
        match stage {
            Stage::PlayingIntroTone => self.intro_duration_ms = Some(duration_ms),
            Stage::PlayingNarration => self.narration_duration_ms = Some(duration_ms),
            _ => {}
        }
    }

    /// Sum of completed prior stages, unknown durations counting as zero
    pub fn stage_offset_ms(&self) -> u64 {
        let intro = self.intro_duration_ms.unwrap_or(0);
        let narration = self.narration_duration_ms.unwrap_or(0);

        match self.stage {
            Stage::Idle | Stage::PlayingIntroTone => 0,
            Stage::PlayingNarration => intro,
            Stage::PlayingOutroTone | Stage::Finished => intro + narration,
        }
    }

    /// Intro + narration + intro again, never below 1
    pub fn total_duration_ms(&self) -> u64 {
        let intro = self.intro_duration_ms.unwrap_or(0);
        let narration = self.narration_duration_ms.unwrap_or(0);
        (intro + narration + intro).max(1)
    }

    pub fn status(&self) -> PlaybackStatus {
        let elapsed = self.handle.as_ref().map(|h| h.position_ms()).unwrap_or(0);
        let duration_ms = self.total_duration_ms();

        PlaybackStatus {
            is_loaded: true,
            position_ms: (self.stage_offset_ms() + elapsed).min(duration_ms),
            duration_ms,
        }
    }

    /// Stop and drop the active handle, if any
    pub fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.stop() {
                warn!("Failed to stop {} handle: {}", self.stage, e);
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release_handle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    struct FakeHandle {
        position: AtomicU64,
        duration: Option<u64>,
        stopped: Arc<AtomicBool>,
    }

    impl FakeHandle {
        fn boxed(position: u64, duration: Option<u64>) -> (Box<dyn AudioHandle>, Arc<AtomicBool>) {
            let stopped = Arc::new(AtomicBool::new(false));
            let handle: Box<dyn AudioHandle> = Box::new(Self {
                position: AtomicU64::new(position),
                duration,
                stopped: Arc::clone(&stopped),
            });
            (handle, stopped)
        }
    }

    impl AudioHandle for FakeHandle {
        fn pause(&self) -> Result<()> {
            Ok(())
        }
        fn resume(&self) -> Result<()> {
            Ok(())
        }
        fn seek(&self, position_ms: u64) -> Result<u64> {
            let applied = position_ms.min(self.duration.unwrap_or(u64::MAX));
            self.position.store(applied, Ordering::SeqCst);
            Ok(applied)
        }
        fn stop(&self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn position_ms(&self) -> u64 {
            self.position.load(Ordering::SeqCst)
        }
        fn duration_ms(&self) -> Option<u64> {
            self.duration
        }
    }

    fn session() -> PlaybackSession {
        PlaybackSession::new(
            1,
            Routine {
                id: "r1".to_string(),
                title: "Routine".to_string(),
                duration: String::new(),
                description: String::new(),
                narration: PathBuf::from("x.mp3"),
                transcript: String::new(),
            },
        )
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session();
        assert_eq!(session.stage(), Stage::Idle);
        assert!(!session.is_playing());
        assert_eq!(session.status().position_ms, 0);
        assert_eq!(session.status().duration_ms, 1);
    }

    #[test]
    fn test_timeline_through_stages() {
        let mut session = session();
        assert!(session.advance(Stage::PlayingIntroTone));
        let (intro, intro_stopped) = FakeHandle::boxed(1200, Some(3000));
        session.attach(intro);

        let status = session.status();
        assert_eq!(status.position_ms, 1200);
        assert_eq!(status.duration_ms, 6000);

        assert!(session.advance(Stage::PlayingNarration));
        assert!(intro_stopped.load(Ordering::SeqCst));
        assert!(!session.has_handle());
        assert_eq!(session.status().position_ms, 3000);

        let (narration, _) = FakeHandle::boxed(2500, Some(10000));
        session.attach(narration);
        let status = session.status();
        assert_eq!(status.position_ms, 5500);
        assert_eq!(status.duration_ms, 16000);

        assert!(session.advance(Stage::PlayingOutroTone));
        assert_eq!(session.stage_offset_ms(), 13000);
        assert_eq!(session.status().position_ms, 13000);
    }

    #[test]
    fn test_stage_never_regresses() {
        let mut session = session();
        assert!(session.advance(Stage::PlayingNarration));
        assert!(!session.advance(Stage::PlayingIntroTone));
        assert!(!session.advance(Stage::PlayingNarration));
        assert_eq!(session.stage(), Stage::PlayingNarration);
    }

    #[test]
    fn test_unknown_durations_count_as_zero() {
        let mut session = session();
        session.advance(Stage::PlayingIntroTone);
        let (intro, _) = FakeHandle::boxed(400, None);
        session.attach(intro);

        let status = session.status();
        assert_eq!(status.duration_ms, 1);
        assert_eq!(status.position_ms, 1);
    }

    #[test]
    fn test_drop_releases_handle() {
        let mut session = session();
        session.advance(Stage::PlayingIntroTone);
        let (intro, stopped) = FakeHandle::boxed(0, Some(3000));
        session.attach(intro);

        drop(session);
        assert!(stopped.load(Ordering::SeqCst));
    }
}
