//! Background progress monitoring

use super::player::SequencedAudioPlayer;
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};
use wub_common::events::WubEvent;

/// Start the progress task.
///
/// Emits `PlaybackProgress` every `interval` while a session is loaded and
/// playing. The task ends once the player is dropped.
pub fn start_monitoring(player: &Arc<SequencedAudioPlayer>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(progress_task(Arc::downgrade(player), interval))
}

async fn progress_task(player: Weak<SequencedAudioPlayer>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Progress task started ({}ms interval)", period.as_millis());

    loop {
        interval.tick().await;

        let Some(player) = player.upgrade() else {
            break;
        };

        let snapshot = player.snapshot().await;
        let Some(session_id) = snapshot.session_id else {
            continue;
        };
        if !snapshot.is_playing {
            continue;
        }

        player.events().emit_lossy(WubEvent::PlaybackProgress {
            session_id,
            position_ms: snapshot.status.position_ms,
            duration_ms: snapshot.status.duration_ms,
            timestamp: Utc::now(),
        });

        debug!(
            "Progress: {}ms / {}ms",
            snapshot.status.position_ms, snapshot.status.duration_ms
        );
    }

    debug!("Progress task exiting");
}
