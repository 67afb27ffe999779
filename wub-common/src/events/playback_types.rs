//! Playback-related type definitions
//!
//! Supporting types for the sequenced routine player.

use serde::{Deserialize, Serialize};

/// Stage of a routine playback session
///
/// Stages only move forward: Idle → PlayingIntroTone → PlayingNarration →
/// PlayingOutroTone → Finished. Stopping or restarting creates a new session
/// rather than moving an existing one backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum Stage {
    /// No session, or session created but not started
    Idle,
    /// Intro bowl tone playing
    PlayingIntroTone,
    /// Narrated routine playing
    PlayingNarration,
    /// Outro bowl tone playing detached from transport controls
    PlayingOutroTone,
    /// Outro tone completed
    Finished,
}

impl Stage {
    fn ordinal(self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::PlayingIntroTone => 1,
            Stage::PlayingNarration => 2,
            Stage::PlayingOutroTone => 3,
            Stage::Finished => 4,
        }
    }

    /// True when `next` lies strictly after this stage in the sequence
    pub fn can_advance_to(self, next: Stage) -> bool {
        next.ordinal() > self.ordinal()
    }

    /// True for stages whose audio responds to pause/resume/seek
    pub fn is_controllable(self) -> bool {
        matches!(self, Stage::PlayingIntroTone | Stage::PlayingNarration)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Idle => write!(f, "Idle"),
            Stage::PlayingIntroTone => write!(f, "PlayingIntroTone"),
            Stage::PlayingNarration => write!(f, "PlayingNarration"),
            Stage::PlayingOutroTone => write!(f, "PlayingOutroTone"),
            Stage::Finished => write!(f, "Finished"),
        }
    }
}

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}
