//! Alarm scheduler integration tests

mod helpers;

use chrono::{Duration as ChronoDuration, Local, NaiveTime, Timelike};
use helpers::fixtures::{fixed_durations, INTRO_MS, NARRATION_MS};
use helpers::{drain_events, headless_player, routine, scripted_player, ScriptedBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wub_ap::alarm::AlarmScheduler;
use wub_common::events::{Stage, WubEvent};

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_schedule_and_cancel() {
    let fixture = headless_player();
    let mut rx = fixture.events.subscribe();
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));

    assert!(alarm.settings().is_none());
    assert!(alarm.schedule(at(6, 45), routine("r1")));

    let settings = alarm.settings().expect("alarm settings");
    assert!(settings.is_enabled);
    assert_eq!(settings.time, at(6, 45));
    assert_eq!(settings.routine_id, "r1");
    let next_fire = settings.next_fire.expect("next fire");
    assert_eq!(next_fire.time(), at(6, 45));
    assert!(next_fire > Local::now().naive_local());

    alarm.cancel();
    let settings = alarm.settings().expect("alarm settings");
    assert!(!settings.is_enabled);
    assert_eq!(settings.next_fire, None);
    assert_eq!(settings.time, at(6, 45));

    let events = drain_events(&mut rx);
    assert!(matches!(events[0], WubEvent::AlarmScheduled { .. }));
    assert!(matches!(events[1], WubEvent::AlarmCancelled { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_updates_require_existing_alarm() {
    let fixture = headless_player();
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));

    assert!(!alarm.update_time(at(7, 0)));
    assert!(!alarm.update_routine(routine("r2")));
    assert!(alarm.settings().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_update_time_reschedules_enabled_alarm() {
    let fixture = headless_player();
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));
    assert!(alarm.schedule(at(6, 0), routine("r1")));

    assert!(alarm.update_time(at(9, 15)));

    let settings = alarm.settings().expect("alarm settings");
    assert!(settings.is_enabled);
    assert_eq!(settings.time, at(9, 15));
    assert_eq!(settings.next_fire.map(|t| t.time()), Some(at(9, 15)));
}

#[tokio::test(start_paused = true)]
async fn test_update_routine_keeps_cancelled_alarm_disabled() {
    let fixture = headless_player();
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));
    assert!(alarm.schedule(at(6, 0), routine("r1")));
    alarm.cancel();

    assert!(alarm.update_routine(routine("r2")));

    let settings = alarm.settings().expect("alarm settings");
    assert!(!settings.is_enabled);
    assert_eq!(settings.routine_id, "r2");
    assert_eq!(settings.next_fire, None);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_fires_and_plays_routine() {
    let fixture = headless_player();
    let mut rx = fixture.events.subscribe();
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));

    let fire_at = (Local::now() + ChronoDuration::minutes(2))
        .time()
        .with_nanosecond(0)
        .expect("valid time");
    assert!(alarm.schedule(fire_at, routine("r2")));
    let first_fire = alarm
        .settings()
        .and_then(|s| s.next_fire)
        .expect("next fire");

    tokio::time::sleep(Duration::from_secs(3 * 60)).await;

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        WubEvent::AlarmFired { routine_id, .. } if routine_id == "r2"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        WubEvent::RoutineStarted { routine_id, .. } if routine_id == "r2"
    )));

    let settings = alarm.settings().expect("alarm settings");
    assert!(settings.is_enabled);
    assert_eq!(
        settings.next_fire,
        Some(first_fire + ChronoDuration::days(1))
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_firing_keeps_routine_starting() {
    // Loads wait on the gate, so the routine is mid-start when cancelled
    let gate = Arc::new(Notify::new());
    let backend = ScriptedBackend::new(fixed_durations(&[
        ("bowl.mp3", INTRO_MS),
        ("r1.mp3", NARRATION_MS),
    ]))
    .with_gate(Arc::clone(&gate));
    let (player, events) = scripted_player(backend);
    let mut rx = events.subscribe();
    let alarm = AlarmScheduler::new(Arc::clone(&player));

    let fire_at = (Local::now() + ChronoDuration::minutes(2))
        .time()
        .with_nanosecond(0)
        .expect("valid time");
    assert!(alarm.schedule(fire_at, routine("r1")));

    tokio::time::sleep(Duration::from_secs(3 * 60)).await;
    assert!(drain_events(&mut rx)
        .iter()
        .any(|e| matches!(e, WubEvent::AlarmFired { .. })));

    alarm.cancel();
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(player.stage().await, Stage::PlayingIntroTone);
    assert!(player.get_is_playing().await);
    assert!(drain_events(&mut rx).iter().any(|e| matches!(
        e,
        WubEvent::RoutineStarted { routine_id, .. } if routine_id == "r1"
    )));
}

#[test]
fn test_schedule_outside_runtime_fails() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let fixture = runtime.block_on(async { headless_player() });
    let alarm = AlarmScheduler::new(Arc::clone(&fixture.player));

    assert!(!alarm.schedule(at(6, 0), routine("r1")));
    assert!(alarm.settings().is_none());
}
