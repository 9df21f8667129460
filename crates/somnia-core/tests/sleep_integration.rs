//! Integration tests for sleep tracking over the SQLite store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use somnia_core::error::SessionError;
use somnia_core::sleep::SleepSchedule;
use somnia_core::storage::KeyValueStore;
use somnia_core::{Database, Event, ManualClock, SleepQuality, SleepTracker};

fn tracker_at(clock: &ManualClock, store: Arc<dyn KeyValueStore>) -> SleepTracker {
    SleepTracker::load(store, Arc::new(clock.clone()), 8.0).unwrap()
}

#[test]
fn test_full_night_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("somnia.db");
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 13, 23, 0, 0).unwrap());

    {
        let store: Arc<dyn KeyValueStore> = Arc::new(Database::open_at(&path).unwrap());
        let mut tracker = tracker_at(&clock, store);
        tracker.start_sleep().unwrap();
    }

    // A fresh process picks up the open session.
    clock.advance(Duration::minutes(330));
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open_at(&path).unwrap());
    let mut tracker = tracker_at(&clock, store.clone());
    assert!(tracker.is_tracking());
    assert_eq!(tracker.current_sleep_duration(), 5.5);

    let event = tracker
        .end_sleep(SleepQuality::Good, Some("woke once".into()))
        .unwrap();
    match event {
        Event::SleepEnded {
            duration_hours,
            goal_met,
            ..
        } => {
            assert_eq!(duration_hours, 5.5);
            assert!(!goal_met);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let reloaded = tracker_at(&clock, store);
    assert!(!reloaded.is_tracking());
    assert_eq!(reloaded.sessions().len(), 1);
    assert_eq!(reloaded.sessions()[0].notes.as_deref(), Some("woke once"));
}

#[test]
fn test_streak_over_three_nights() {
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open_memory().unwrap());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 10, 22, 0, 0).unwrap());
    let mut tracker = tracker_at(&clock, store);

    for _ in 0..3 {
        tracker.start_sleep().unwrap();
        clock.advance(Duration::hours(8) + Duration::minutes(30));
        tracker.end_sleep(SleepQuality::Great, None).unwrap();
        clock.advance(Duration::hours(15) + Duration::minutes(30));
    }

    // Back to the morning of the last wake day.
    clock.advance(Duration::hours(-15));
    let stats = tracker.sleep_stats(7);
    assert_eq!(stats.sleep_streak, 3);
    assert_eq!(stats.goal_achievement, 3);
    assert_eq!(stats.average_sleep, 8.5);
    assert_eq!(stats.total_sessions, 3);
}

#[test]
fn test_second_start_is_rejected_and_keeps_session() {
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open_memory().unwrap());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 10, 22, 0, 0).unwrap());
    let mut tracker = tracker_at(&clock, store);

    tracker.start_sleep().unwrap();
    let first = tracker.current_session().unwrap().id.clone();
    clock.advance(Duration::hours(1));

    let err = tracker.start_sleep().unwrap_err();
    assert_eq!(err, SessionError::AlreadyTracking { session_id: first.clone() });
    assert_eq!(tracker.current_session().unwrap().id, first);
}

#[test]
fn test_schedule_round_trip_through_database() {
    let store = Database::open_memory().unwrap();
    let schedule = SleepSchedule {
        bedtime: somnia_core::sleep::parse_clock_time("23:15").unwrap(),
        wake_time: somnia_core::sleep::parse_clock_time("06:45").unwrap(),
    };
    schedule.save(&store).unwrap();
    assert_eq!(SleepSchedule::load(&store).unwrap(), schedule);
    assert_eq!(schedule.planned_hours(), 7.5);
}

proptest! {
    #[test]
    fn duration_never_decreases(offsets in proptest::collection::vec(0i64..86_400_000, 1..20)) {
        let store: Arc<dyn KeyValueStore> = Arc::new(somnia_core::MemoryStore::new());
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 22, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let mut tracker = tracker_at(&clock, store);
        tracker.start_sleep().unwrap();

        let mut sorted = offsets;
        sorted.sort_unstable();
        let mut last = 0.0;
        for ms in sorted {
            clock.set(start + Duration::milliseconds(ms));
            let now = tracker.current_sleep_duration();
            prop_assert!(now >= last);
            last = now;
        }
    }
}
