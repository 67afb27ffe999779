//! Internal playback events (not exposed via SSE)
//!
//! Backend completion callbacks run on backend-owned threads and tasks. They
//! only post a `StageEvent`; the player's stage driver task consumes these
//! and performs the transition. Client-visible events are `WubEvent`s.

use wub_common::events::Stage;

/// Backend → player notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// The asset of `stage` ended (or, for the outro, could not be started).
    ///
    /// `generation` is the player generation captured when the asset was
    /// loaded; events from a replaced or stopped session are discarded.
    StageComplete { generation: u64, stage: Stage },
}
