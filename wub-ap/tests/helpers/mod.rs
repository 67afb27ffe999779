//! Shared test helpers for wub-ap integration tests

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod fixtures;
pub mod scripted;

pub use audio_generator::{generate_mono_wav, generate_sine_wav};
pub use fixtures::{drain_events, headless_player, routine, PlayerFixture};
pub use scripted::{scripted_player, ScriptedBackend};
