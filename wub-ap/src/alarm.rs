//! Daily wake-up alarm
//!
//! One repeating alarm at a local wall-clock time, bound to a routine. When
//! it fires the scheduler emits `AlarmFired` and starts the routine on the
//! player; the player itself knows nothing about scheduling.

use crate::playback::SequencedAudioPlayer;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wub_common::events::{EventBus, WubEvent};
use wub_common::Routine;

/// Current alarm configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmSettings {
    pub time: NaiveTime,
    pub is_enabled: bool,
    pub routine_id: String,
    /// Local time of the next firing, None while disabled
    pub next_fire: Option<NaiveDateTime>,
}

#[derive(Default)]
struct AlarmState {
    settings: Option<AlarmSettings>,
    routine: Option<Routine>,
    task: Option<JoinHandle<()>>,
}

impl AlarmState {
    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Single daily alarm driving the player
pub struct AlarmScheduler {
    player: Arc<SequencedAudioPlayer>,
    events: EventBus,
    state: Arc<Mutex<AlarmState>>,
}

impl AlarmScheduler {
    pub fn new(player: Arc<SequencedAudioPlayer>) -> Self {
        let events = player.events().clone();
        Self {
            player,
            events,
            state: Arc::new(Mutex::new(AlarmState::default())),
        }
    }

    /// Schedule the daily alarm, replacing any existing one.
    ///
    /// Returns false when called outside a tokio runtime.
    pub fn schedule(&self, time: NaiveTime, routine: Routine) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("Cannot schedule alarm outside the tokio runtime");
            return false;
        };

        let next_fire = next_occurrence(Local::now().naive_local(), time);

        let mut state = self.lock_state();
        state.abort_task();

        let task = runtime.spawn(alarm_task(
            Arc::downgrade(&self.state),
            Arc::clone(&self.player),
            self.events.clone(),
            routine.clone(),
            next_fire,
        ));

        state.settings = Some(AlarmSettings {
            time,
            is_enabled: true,
            routine_id: routine.id.clone(),
            next_fire: Some(next_fire),
        });
        state.routine = Some(routine.clone());
        state.task = Some(task);
        drop(state);

        info!(
            "Alarm scheduled at {} for routine '{}' (next {})",
            time.format("%H:%M"),
            routine.id,
            next_fire
        );
        self.events.emit_lossy(WubEvent::AlarmScheduled {
            routine_id: routine.id,
            next_fire,
            timestamp: Utc::now(),
        });

        true
    }

    /// Disable the alarm, keeping its time and routine
    pub fn cancel(&self) {
        let mut state = self.lock_state();
        state.abort_task();

        let Some(settings) = state.settings.as_mut() else {
            return;
        };
        settings.is_enabled = false;
        settings.next_fire = None;
        drop(state);

        info!("Alarm cancelled");
        self.events.emit_lossy(WubEvent::AlarmCancelled {
            timestamp: Utc::now(),
        });
    }

    /// Change the alarm time. Reschedules when enabled.
    ///
    /// Returns false when no alarm was ever scheduled.
    pub fn update_time(&self, time: NaiveTime) -> bool {
        let (enabled, routine) = {
            let mut state = self.lock_state();
            let Some(settings) = state.settings.as_mut() else {
                return false;
            };
            settings.time = time;
            let enabled = settings.is_enabled;
            (enabled, state.routine.clone())
        };

        match routine {
            Some(routine) if enabled => self.schedule(time, routine),
            _ => true,
        }
    }

    /// Change the alarm routine. Reschedules when enabled.
    ///
    /// Returns false when no alarm was ever scheduled.
    pub fn update_routine(&self, routine: Routine) -> bool {
        let (enabled, time) = {
            let mut state = self.lock_state();
            let Some(settings) = state.settings.as_mut() else {
                return false;
            };
            settings.routine_id = routine.id.clone();
            let snapshot = (settings.is_enabled, settings.time);
            state.routine = Some(routine.clone());
            snapshot
        };

        if enabled {
            self.schedule(time, routine)
        } else {
            true
        }
    }

    pub fn settings(&self) -> Option<AlarmSettings> {
        self.lock_state().settings.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.lock_state().abort_task();
    }
}

/// Next local date-time at `at`: today if still ahead of `now`, else tomorrow
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

async fn alarm_task(
    state: Weak<Mutex<AlarmState>>,
    player: Arc<SequencedAudioPlayer>,
    events: EventBus,
    routine: Routine,
    mut next_fire: NaiveDateTime,
) {
    loop {
        let wait = (next_fire - Local::now().naive_local())
            .to_std()
            .unwrap_or_default();
        debug!("Alarm sleeping {}s until {}", wait.as_secs(), next_fire);
        tokio::time::sleep(wait).await;

        info!("Alarm fired, starting routine '{}'", routine.id);
        events.emit_lossy(WubEvent::AlarmFired {
            routine_id: routine.id.clone(),
            timestamp: Utc::now(),
        });

        // Own task: cancelling the alarm must not abort a routine that has
        // already started tearing down the previous session
        let starter = Arc::clone(&player);
        let fired = routine.clone();
        tokio::spawn(async move {
            if !starter.play_routine(&fired).await {
                warn!("Alarm routine '{}' failed to start", fired.id);
            }
        });

        next_fire += ChronoDuration::days(1);

        let Some(shared) = state.upgrade() else {
            break;
        };
        if let Some(settings) = shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .as_mut()
        {
            settings.next_fire = Some(next_fire);
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_next_occurrence_later_today() {
        assert_eq!(next_occurrence(day(10, 6, 0), at(7, 30)), day(10, 7, 30));
    }

    #[test]
    fn test_next_occurrence_rolls_to_tomorrow() {
        assert_eq!(next_occurrence(day(10, 8, 0), at(7, 30)), day(11, 7, 30));
    }

    #[test]
    fn test_next_occurrence_exact_time_is_tomorrow() {
        assert_eq!(next_occurrence(day(10, 7, 30), at(7, 30)), day(11, 7, 30));
    }

    #[test]
    fn test_next_occurrence_crosses_month_end() {
        let april_first = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(next_occurrence(day(31, 23, 59), at(6, 0)), april_first);
    }
}
