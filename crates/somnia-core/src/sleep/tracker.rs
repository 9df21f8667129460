//! Sleep session engine.
//!
//! A small state machine over [`TrackingState`]:
//!
//! ```text
//! Idle --start_sleep--> Tracking(session) --end_sleep--> Idle
//! ```
//!
//! Every transition updates memory first and then writes the full state to
//! the key-value store. A failed write is logged and remembered; the next
//! successful write (or an explicit [`SleepTracker::flush`]) reconciles it.

use std::sync::Arc;

use tracing::{info, warn};

use super::session::{SleepQuality, SleepSession, TrackingState};
use super::stats::{compute_sleep_stats, SleepStats};
use crate::clock::Clock;
use crate::error::{SessionError, StorageError, ValidationError};
use crate::events::Event;
use crate::storage::{keys, load_json, save_json, KeyValueStore};

/// Progress of the open session towards the goal, read by the alarm monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    pub session_id: String,
    pub elapsed_hours: f64,
    pub goal_hours: f64,
}

impl GoalProgress {
    pub fn reached(&self) -> bool {
        self.elapsed_hours >= self.goal_hours
    }
}

pub struct SleepTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: TrackingState,
    /// Closed sessions, oldest first.
    sessions: Vec<SleepSession>,
    goal_hours: f64,
    unsaved: bool,
}

impl std::fmt::Debug for SleepTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SleepTracker")
            .field("state", &self.state)
            .field("sessions", &self.sessions.len())
            .field("goal_hours", &self.goal_hours)
            .field("unsaved", &self.unsaved)
            .finish()
    }
}

impl SleepTracker {
    /// Restore tracker state from the store.
    ///
    /// `default_goal_hours` applies until a goal has been saved.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        default_goal_hours: f64,
    ) -> Result<Self, StorageError> {
        let mut tracker = Self {
            store,
            clock,
            state: TrackingState::Idle,
            sessions: Vec::new(),
            goal_hours: default_goal_hours,
            unsaved: false,
        };
        tracker.read_store()?;
        Ok(tracker)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackingState::Tracking(_))
    }

    pub fn current_session(&self) -> Option<&SleepSession> {
        self.state.session()
    }

    /// Closed sessions, oldest first.
    pub fn sessions(&self) -> &[SleepSession] {
        &self.sessions
    }

    pub fn goal_hours(&self) -> f64 {
        self.goal_hours
    }

    /// True while the last write to the store failed.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Hours since the open session started, one decimal; `0.0` when idle.
    pub fn current_sleep_duration(&self) -> f64 {
        self.current_session()
            .map(|s| s.elapsed_hours(self.clock.now()))
            .unwrap_or(0.0)
    }

    pub fn goal_progress(&self) -> Option<GoalProgress> {
        self.current_session().map(|s| GoalProgress {
            session_id: s.id.clone(),
            elapsed_hours: s.elapsed_hours(self.clock.now()),
            goal_hours: self.goal_hours,
        })
    }

    pub fn sleep_stats(&self, window_days: u32) -> SleepStats {
        compute_sleep_stats(&self.sessions, self.clock.now(), self.goal_hours, window_days)
    }

    pub fn snapshot(&self) -> Event {
        let session = self.current_session();
        Event::SleepSnapshot {
            tracking: session.is_some(),
            session_id: session.map(|s| s.id.clone()),
            started_at: session.map(|s| s.start_time),
            current_duration_hours: self.current_sleep_duration(),
            goal_hours: self.goal_hours,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start_sleep(&mut self) -> Result<Event, SessionError> {
        if let TrackingState::Tracking(open) = &self.state {
            return Err(SessionError::AlreadyTracking {
                session_id: open.id.clone(),
            });
        }

        let now = self.clock.now();
        let session = SleepSession::open(self.next_session_id(now.timestamp_millis()), now);
        let session_id = session.id.clone();
        self.state = TrackingState::Tracking(session);
        info!(session_id = %session_id, "sleep tracking started");
        self.persist();

        Ok(Event::SleepStarted { session_id, at: now })
    }

    pub fn end_sleep(
        &mut self,
        quality: SleepQuality,
        notes: Option<String>,
    ) -> Result<Event, SessionError> {
        let open = match std::mem::take(&mut self.state) {
            TrackingState::Tracking(session) => session,
            TrackingState::Idle => return Err(SessionError::NoOpenSession),
        };

        let now = self.clock.now();
        let closed = open.close(now, quality, notes);
        let duration_hours = closed.duration_hours.unwrap_or(0.0);
        let session_id = closed.id.clone();
        self.sessions.push(closed);
        info!(session_id = %session_id, duration_hours, %quality, "sleep tracking ended");
        self.persist();

        Ok(Event::SleepEnded {
            session_id,
            duration_hours,
            quality,
            goal_met: duration_hours >= self.goal_hours,
            at: now,
        })
    }

    pub fn set_sleep_goal(&mut self, hours: f64) -> Result<Event, ValidationError> {
        if !(hours > 0.0 && hours <= 24.0) {
            return Err(ValidationError::InvalidValue {
                field: "goal_hours".into(),
                message: format!("{hours} is outside (0, 24]"),
            });
        }
        self.goal_hours = hours;
        self.persist();
        Ok(Event::SleepGoalChanged {
            goal_hours: hours,
            at: self.clock.now(),
        })
    }

    /// Re-read sessions, the open session and the goal from the store, so
    /// writes made by another process become visible. Skipped while the
    /// last write failed, since memory then holds newer intent than the
    /// store.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        if self.unsaved {
            return Ok(());
        }
        self.read_store()
    }

    /// Retry writing the full state.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let result = self.write_all();
        self.unsaved = result.is_err();
        result
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to persist sleep state; keeping in-memory state");
        }
    }

    /// A goal that was never saved keeps the current value.
    fn read_store(&mut self) -> Result<(), StorageError> {
        let store = self.store.as_ref();
        let sessions: Vec<SleepSession> =
            load_json(store, keys::SLEEP_SESSIONS)?.unwrap_or_default();
        let current: Option<SleepSession> =
            load_json::<Option<SleepSession>>(store, keys::CURRENT_SLEEP)?.flatten();
        let goal_hours: f64 = load_json(store, keys::SLEEP_GOAL)?.unwrap_or(self.goal_hours);

        self.sessions = sessions;
        self.goal_hours = goal_hours;
        self.state = match current {
            Some(session) if session.is_open() => TrackingState::Tracking(session),
            _ => TrackingState::Idle,
        };
        Ok(())
    }

    fn write_all(&self) -> Result<(), StorageError> {
        let store = self.store.as_ref();
        save_json(store, keys::SLEEP_SESSIONS, &self.sessions)?;
        save_json(store, keys::CURRENT_SLEEP, &self.current_session())?;
        save_json(store, keys::SLEEP_GOAL, &self.goal_hours)
    }

    /// Epoch-millisecond id, bumped past the newest existing one.
    fn next_session_id(&self, now_ms: i64) -> String {
        let newest = self
            .sessions
            .iter()
            .filter_map(|s| s.id.parse::<i64>().ok())
            .max()
            .unwrap_or(i64::MIN);
        now_ms.max(newest.saturating_add(1)).to_string()
    }
}
