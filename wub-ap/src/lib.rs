//! # WakeUp Buddy Audio Player Library (wub-ap)
//!
//! Plays wake-up routines as a three-stage sequence: intro bowl tone,
//! narration, outro bowl tone. One routine session at a time, controlled over
//! HTTP and reported over SSE.
//!
//! **Architecture:** `SequencedAudioPlayer` over a pluggable `AudioBackend`
//! (cpal device output, or a silent clock-driven headless backend), with a
//! daily `AlarmScheduler` and an axum control API.

pub mod alarm;
pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
