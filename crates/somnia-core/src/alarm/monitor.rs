//! Drives the alarm engine from a periodic tick.
//!
//! The monitor owns the engine and the effect dispatcher and reads the
//! sleep tracker for the goal-reached path. It is shared with the scheduler
//! callback behind an `Arc<Mutex<_>>`; each tick locks it once.
//!
//! With a store attached, every tick first re-reads the alarm state and the
//! tracker, so snooze, stop or `start_sleep` issued by another process take
//! effect on the next tick.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::effects::{AlarmDispatcher, DispatchReport, Effect, EffectRunner, PromptAction};
use super::engine::{AlarmEngine, Transition};
use crate::clock::Clock;
use crate::error::AlarmError;
use crate::events::Event;
use crate::scheduler::{CancelToken, Scheduler};
use crate::sleep::SleepTracker;
use crate::storage::{KeyValueStore, NotificationsConfig};

/// Events kept for [`AlarmMonitor::drain_events`]. Older ones are dropped
/// first when nobody drains.
pub const MAX_PENDING_EVENTS: usize = 256;

pub struct AlarmMonitor {
    engine: AlarmEngine,
    runner: EffectRunner,
    tracker: Arc<Mutex<SleepTracker>>,
    clock: Arc<dyn Clock>,
    dispatcher: Box<dyn AlarmDispatcher>,
    store: Option<Arc<dyn KeyValueStore>>,
    /// Set while the last save failed; memory is then ahead of the store.
    unsaved: bool,
    pending_events: VecDeque<Event>,
    last_report: DispatchReport,
}

impl std::fmt::Debug for AlarmMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmMonitor")
            .field("engine", &self.engine)
            .field("pending_events", &self.pending_events.len())
            .finish_non_exhaustive()
    }
}

impl AlarmMonitor {
    pub fn new(
        engine: AlarmEngine,
        tracker: Arc<Mutex<SleepTracker>>,
        clock: Arc<dyn Clock>,
        dispatcher: Box<dyn AlarmDispatcher>,
    ) -> Self {
        Self {
            engine,
            runner: EffectRunner::default(),
            tracker,
            clock,
            dispatcher,
            store: None,
            unsaved: false,
            pending_events: VecDeque::new(),
            last_report: DispatchReport::default(),
        }
    }

    /// Persist the alarm state to `store` after every change, and re-read
    /// it before every tick.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Apply volume, vibration and the notices switch.
    pub fn with_notifications(mut self, config: &NotificationsConfig) -> Self {
        self.runner = EffectRunner::new(config);
        self
    }

    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    /// Report from the most recent batch of effects.
    pub fn last_report(&self) -> &DispatchReport {
        &self.last_report
    }

    /// Events produced by ticks since the last drain, oldest first. At most
    /// [`MAX_PENDING_EVENTS`] are kept.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.pending_events.drain(..).collect()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Evaluate both trigger paths once.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        self.sync_from_store();
        let goal = {
            let mut tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
            if self.store.is_some() {
                if let Err(e) = tracker.reload() {
                    warn!(error = %e, "failed to reload sleep state");
                }
            }
            tracker.goal_progress()
        };
        let transition = self.engine.evaluate(now, goal.as_ref());
        if transition.is_empty() {
            debug!(%now, phase = ?self.engine.phase(), "alarm tick");
            return Vec::new();
        }
        let events = self.apply(transition);
        self.queue(&events);
        events
    }

    pub fn set_alarm(&mut self, alarm_time: DateTime<Utc>) -> Result<Vec<Event>, AlarmError> {
        let transition = self.engine.set_alarm(alarm_time, self.clock.now())?;
        Ok(self.apply(transition))
    }

    pub fn disable(&mut self) -> Vec<Event> {
        let transition = self.engine.disable(self.clock.now());
        self.apply(transition)
    }

    pub fn stop(&mut self) -> Vec<Event> {
        let transition = self.engine.stop(self.clock.now());
        self.apply(transition)
    }

    /// Snooze for `minutes`, or the configured default.
    pub fn snooze(&mut self, minutes: Option<u32>) -> Result<Vec<Event>, AlarmError> {
        let minutes = minutes.unwrap_or_else(|| self.engine.snooze_minutes());
        let transition = self.engine.snooze(self.clock.now(), minutes)?;
        Ok(self.apply(transition))
    }

    pub fn respond(&mut self, action: PromptAction) -> Result<Vec<Event>, AlarmError> {
        let transition = self.engine.respond(action, self.clock.now())?;
        Ok(self.apply(transition))
    }

    /// State is committed before effects run, so a dispatcher failure
    /// cannot leave the engine half-transitioned.
    fn apply(&mut self, transition: Transition) -> Vec<Event> {
        if let Some(store) = &self.store {
            match self.engine.save(store.as_ref()) {
                Ok(()) => self.unsaved = false,
                Err(e) => {
                    warn!(error = %e, "failed to persist alarm state");
                    self.unsaved = true;
                }
            }
        }
        self.last_report = self.runner.run(self.dispatcher.as_mut(), &transition.effects);
        transition.events
    }

    /// Pick up alarm changes written by another process. A ring silenced
    /// elsewhere is stopped here too.
    fn sync_from_store(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if self.unsaved {
            return;
        }
        match self.engine.reload(store.as_ref()) {
            Ok(previous) => {
                if previous.alarm_active && !self.engine.state().alarm_active {
                    debug!("alarm silenced from another process");
                    self.last_report = self.runner.run(self.dispatcher.as_mut(), &[Effect::StopSound]);
                }
            }
            Err(e) => warn!(error = %e, "failed to reload alarm state"),
        }
    }

    fn queue(&mut self, events: &[Event]) {
        for event in events {
            if self.pending_events.len() == MAX_PENDING_EVENTS {
                self.pending_events.pop_front();
            }
            self.pending_events.push_back(event.clone());
        }
    }
}

/// Tick `monitor` every `period` until the token is cancelled.
pub fn spawn_alarm_loop(
    monitor: Arc<Mutex<AlarmMonitor>>,
    scheduler: &dyn Scheduler,
    period: Duration,
) -> CancelToken {
    scheduler.schedule(
        period,
        Box::new(move || {
            monitor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .tick();
        }),
    )
}
