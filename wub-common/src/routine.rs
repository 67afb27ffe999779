//! Wake-up routine model and catalog
//!
//! A routine is a narrated audio segment played between two bowl tones.
//! Only `narration` (and `title`, for logging and events) matter to playback;
//! the remaining fields are display data passed through to clients.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// A wake-up routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    /// Identifier, unique within a catalog
    pub id: String,

    /// Display title
    pub title: String,

    /// Display duration text (e.g. "5 min"), not used for sequencing
    #[serde(default)]
    pub duration: String,

    /// Display description
    #[serde(default)]
    pub description: String,

    /// Narrated segment asset, absolute or relative to the assets folder
    #[serde(alias = "spoken_audio_reference")]
    pub narration: PathBuf,

    /// Narration transcript
    #[serde(default)]
    pub transcript: String,
}

/// Ordered collection of routines with unique ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutineCatalog {
    routines: Vec<Routine>,
}

impl RoutineCatalog {
    /// Build a catalog, rejecting empty lists and duplicate ids
    pub fn new(routines: Vec<Routine>) -> Result<Self> {
        if routines.is_empty() {
            return Err(Error::InvalidInput("Routine catalog is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for routine in &routines {
            if !seen.insert(routine.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate routine id: {}",
                    routine.id
                )));
            }
        }

        Ok(Self { routines })
    }

    /// Built-in catalog shipped with the app
    pub fn builtin() -> Self {
        Self {
            routines: vec![Routine {
                id: "morning-breath".to_string(),
                title: "Morning Breath".to_string(),
                duration: "5 min".to_string(),
                description: "A gentle breathing practice to ease into the day.".to_string(),
                narration: PathBuf::from("ElevenLabs.mp3"),
                transcript: "Good morning. Take a slow breath in, and let it go.".to_string(),
            }],
        }
    }

    /// Look up a routine by id
    pub fn get(&self, id: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    /// Look up a routine by id, failing with `NotFound`
    pub fn require(&self, id: &str) -> Result<&Routine> {
        self.get(id)
            .ok_or_else(|| Error::NotFound(format!("Routine '{}'", id)))
    }

    /// Default routine (first in catalog order)
    pub fn first(&self) -> &Routine {
        // Non-empty by construction
        &self.routines[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Routine> {
        self.routines.iter()
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

impl Default for RoutineCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
