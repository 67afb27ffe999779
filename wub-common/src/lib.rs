//! # WakeUp Buddy Common Library
//!
//! Shared code for the WakeUp Buddy services including:
//! - Routine model and built-in catalog
//! - Event types (WubEvent enum) and EventBus
//! - Configuration file discovery and assets folder resolution
//! - Clock formatting for progress displays

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod routine;

pub use error::{Error, Result};
pub use routine::{Routine, RoutineCatalog};
