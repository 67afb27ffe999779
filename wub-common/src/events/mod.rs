//! Event types for the WakeUp Buddy event system
//!
//! Provides shared event definitions and EventBus.

mod playback_types;

pub use playback_types::{PlaybackState, Stage};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// WakeUp Buddy event types
///
/// Events are broadcast via EventBus and serialized as JSON for SSE clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WubEvent {
    /// A routine session started (intro tone began playing)
    RoutineStarted {
        /// Session UUID, new for every play request
        session_id: Uuid,
        routine_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// Session moved to a new stage
    StageChanged {
        session_id: Uuid,
        stage: Stage,
        timestamp: DateTime<Utc>,
    },

    /// Playback state changed (Playing ↔ Paused)
    PlaybackStateChanged {
        session_id: Uuid,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Periodic progress update for progress bars
    ///
    /// `duration_ms` grows as each stage's metadata loads; clients must not
    /// treat it as fixed.
    PlaybackProgress {
        session_id: Uuid,
        position_ms: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Outro tone finished; the session has been released
    RoutineCompleted {
        session_id: Uuid,
        routine_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Session stopped explicitly (stop or replaced by a new routine)
    PlaybackStopped {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// An asset failed to load; the session (if any) has been released
    PlaybackFailed {
        routine_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Daily alarm scheduled or rescheduled
    AlarmScheduled {
        routine_id: String,
        /// Local wall-clock time of the next firing
        next_fire: NaiveDateTime,
        timestamp: DateTime<Utc>,
    },

    /// Daily alarm cancelled
    AlarmCancelled { timestamp: DateTime<Utc> },

    /// Alarm fired and is starting its routine
    AlarmFired {
        routine_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl WubEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WubEvent::RoutineStarted { .. } => "RoutineStarted",
            WubEvent::StageChanged { .. } => "StageChanged",
            WubEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            WubEvent::PlaybackProgress { .. } => "PlaybackProgress",
            WubEvent::RoutineCompleted { .. } => "RoutineCompleted",
            WubEvent::PlaybackStopped { .. } => "PlaybackStopped",
            WubEvent::PlaybackFailed { .. } => "PlaybackFailed",
            WubEvent::AlarmScheduled { .. } => "AlarmScheduled",
            WubEvent::AlarmCancelled { .. } => "AlarmCancelled",
            WubEvent::AlarmFired { .. } => "AlarmFired",
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use wub_common::events::{EventBus, WubEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(WubEvent::AlarmCancelled {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(WubEvent::AlarmCancelled { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WubEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<WubEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: WubEvent) -> Result<usize, broadcast::error::SendError<WubEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WubEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
