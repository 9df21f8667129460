//! Alarm trigger engine.
//!
//! A synchronous state machine. It does not own a timer; the caller feeds
//! it the current time through [`AlarmEngine::evaluate`] once per tick.
//!
//! ## State Transitions
//!
//! ```text
//! Disarmed --set_alarm--> Armed --evaluate--> Triggered
//! Triggered --snooze--> Armed (alarm_time = now + minutes)
//! Triggered --stop--> Disarmed
//! ```
//!
//! Two trigger paths converge on `Triggered`: the scheduled alarm time
//! entering the trigger window, and the open sleep session reaching the
//! sleep goal. The reason is kept in the state.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::effects::{AlarmPrompt, Effect, PromptAction};
use super::state::{AlarmPhase, AlarmState, TriggerReason};
use crate::error::{AlarmError, StorageError};
use crate::events::Event;
use crate::sleep::GoalProgress;
use crate::storage::{keys, load_json, save_json, AlarmConfig, KeyValueStore, MAX_TRIGGER_WINDOW_SECS};

/// What a command or tick produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub events: Vec<Event>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.effects.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AlarmEngine {
    state: AlarmState,
    sound: String,
    snooze_minutes: u32,
    trigger_window: Duration,
}

impl AlarmEngine {
    pub fn new(config: &AlarmConfig) -> Self {
        Self::with_state(AlarmState::default(), config)
    }

    pub fn with_state(state: AlarmState, config: &AlarmConfig) -> Self {
        Self {
            state,
            sound: config.sound.clone(),
            snooze_minutes: config.snooze_minutes.max(1),
            trigger_window: Duration::seconds(
                config.trigger_window_secs.min(MAX_TRIGGER_WINDOW_SECS) as i64,
            ),
        }
    }

    /// Restore the engine from the `alarm_state` key.
    pub fn load(store: &dyn KeyValueStore, config: &AlarmConfig) -> Result<Self, StorageError> {
        let state = load_json(store, keys::ALARM_STATE)?.unwrap_or_default();
        Ok(Self::with_state(state, config))
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        save_json(store, keys::ALARM_STATE, &self.state)
    }

    /// Replace the state with whatever `store` holds now. Returns the state
    /// that was replaced.
    pub fn reload(&mut self, store: &dyn KeyValueStore) -> Result<AlarmState, StorageError> {
        let state = load_json(store, keys::ALARM_STATE)?.unwrap_or_default();
        Ok(std::mem::replace(&mut self.state, state))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn phase(&self) -> AlarmPhase {
        self.state.phase()
    }

    pub fn snooze_minutes(&self) -> u32 {
        self.snooze_minutes
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::AlarmSnapshot {
            phase: self.phase(),
            alarm_time: self.state.alarm_time,
            reason: self.state.reason,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_alarm(&mut self, alarm_time: DateTime<Utc>, now: DateTime<Utc>) -> Result<Transition, AlarmError> {
        if alarm_time <= now {
            return Err(AlarmError::InPast { alarm_time, now });
        }
        let mut transition = Transition::none();
        if self.state.alarm_active {
            transition.effects.push(Effect::StopSound);
        }
        self.state.alarm_time = Some(alarm_time);
        self.state.alarm_enabled = true;
        self.state.alarm_active = false;
        self.state.reason = None;
        info!(%alarm_time, "alarm armed");
        transition.events.push(Event::AlarmSet { alarm_time, at: now });
        Ok(transition)
    }

    pub fn disable(&mut self, now: DateTime<Utc>) -> Transition {
        let mut transition = Transition::none();
        if self.state.alarm_active {
            transition.effects.push(Effect::StopSound);
        }
        self.state.alarm_enabled = false;
        self.state.alarm_active = false;
        self.state.alarm_time = None;
        self.state.reason = None;
        transition.events.push(Event::AlarmDisabled { at: now });
        transition
    }

    /// One tick. Fires at most once; a ringing alarm produces nothing until
    /// it is snoozed or stopped.
    pub fn evaluate(&mut self, now: DateTime<Utc>, goal: Option<&GoalProgress>) -> Transition {
        if self.state.alarm_active {
            return Transition::none();
        }

        if self.state.alarm_enabled {
            if let Some(alarm_time) = self.state.alarm_time {
                let delta = alarm_time - now;
                if delta >= Duration::zero() && delta <= self.trigger_window {
                    return self.trigger(TriggerReason::Scheduled, now, goal);
                }
            }
        }

        if let Some(progress) = goal {
            let already_fired = self.state.goal_fired_for.as_deref() == Some(progress.session_id.as_str());
            if progress.reached() && !already_fired {
                return self.trigger(TriggerReason::GoalReached, now, goal);
            }
        }

        Transition::none()
    }

    /// Silence and disarm.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Transition {
        self.state.alarm_active = false;
        self.state.alarm_time = None;
        self.state.reason = None;
        info!("alarm stopped");
        Transition {
            events: vec![Event::AlarmStopped { at: now }],
            effects: vec![Effect::StopSound],
        }
    }

    /// Silence and re-arm `minutes` from now. Only valid while ringing.
    pub fn snooze(&mut self, now: DateTime<Utc>, minutes: u32) -> Result<Transition, AlarmError> {
        if !self.state.alarm_active {
            return Err(AlarmError::NotRinging);
        }
        if minutes == 0 {
            return Err(AlarmError::InvalidSnooze);
        }
        let until = now + Duration::minutes(i64::from(minutes));
        self.state.alarm_active = false;
        self.state.alarm_enabled = true;
        self.state.alarm_time = Some(until);
        self.state.reason = None;
        info!(%until, minutes, "alarm snoozed");
        Ok(Transition {
            events: vec![Event::AlarmSnoozed { minutes, until, at: now }],
            effects: vec![Effect::StopSound],
        })
    }

    /// Apply a prompt button.
    pub fn respond(&mut self, action: PromptAction, now: DateTime<Utc>) -> Result<Transition, AlarmError> {
        match action {
            PromptAction::Snooze { minutes } => self.snooze(now, minutes),
            PromptAction::Stop => Ok(self.stop(now)),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn trigger(&mut self, reason: TriggerReason, now: DateTime<Utc>, goal: Option<&GoalProgress>) -> Transition {
        self.state.alarm_active = true;
        self.state.reason = Some(reason);
        // Any ring past the goal counts as the goal ring for this session.
        if let Some(progress) = goal.filter(|p| p.reached()) {
            self.state.goal_fired_for = Some(progress.session_id.clone());
        }
        info!(?reason, "alarm triggered");

        Transition {
            events: vec![Event::AlarmTriggered {
                reason,
                alarm_time: self.state.alarm_time,
                at: now,
            }],
            effects: vec![
                Effect::PlaySound {
                    sound: self.sound.clone(),
                },
                Effect::ShowPrompt(self.prompt_for(reason, goal)),
            ],
        }
    }

    fn prompt_for(&self, reason: TriggerReason, goal: Option<&GoalProgress>) -> AlarmPrompt {
        let (title, message) = match (reason, goal) {
            (TriggerReason::GoalReached, Some(progress)) => (
                "Sleep goal reached".to_string(),
                format!(
                    "You've slept {:.1} of your {:.1} hour goal.",
                    progress.elapsed_hours, progress.goal_hours
                ),
            ),
            _ => ("Wake up!".to_string(), "It's time to wake up.".to_string()),
        };
        AlarmPrompt {
            reason,
            title,
            message,
            actions: vec![
                PromptAction::Snooze {
                    minutes: self.snooze_minutes,
                },
                PromptAction::Stop,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 6, 59, 0).unwrap()
    }

    fn armed(at: DateTime<Utc>) -> AlarmEngine {
        let mut engine = AlarmEngine::new(&AlarmConfig::default());
        engine.set_alarm(at, now() - Duration::hours(8)).unwrap();
        engine
    }

    fn goal(session_id: &str, elapsed_hours: f64) -> GoalProgress {
        GoalProgress {
            session_id: session_id.into(),
            elapsed_hours,
            goal_hours: 8.0,
        }
    }

    #[test]
    fn triggers_inside_window_only_once() {
        let mut engine = armed(now() + Duration::seconds(30));
        let first = engine.evaluate(now(), None);
        assert_eq!(engine.phase(), AlarmPhase::Triggered);
        assert_eq!(first.effects.len(), 2);
        assert!(matches!(first.effects[0], Effect::PlaySound { .. }));

        let second = engine.evaluate(now() + Duration::seconds(1), None);
        assert!(second.is_empty());
    }

    #[test]
    fn does_not_trigger_outside_window() {
        let mut engine = armed(now() + Duration::seconds(90));
        assert!(engine.evaluate(now(), None).is_empty());
        assert_eq!(engine.phase(), AlarmPhase::Armed);

        // 30s later the delta is 60s: inside the window.
        engine.evaluate(now() + Duration::seconds(30), None);
        assert_eq!(engine.phase(), AlarmPhase::Triggered);
    }

    #[test]
    fn past_alarm_time_does_not_trigger() {
        let mut engine = armed(now() - Duration::seconds(1));
        assert!(engine.evaluate(now(), None).is_empty());
        assert_eq!(engine.phase(), AlarmPhase::Armed);
    }

    #[test]
    fn snooze_rearms_five_minutes_out() {
        let mut engine = armed(now() + Duration::seconds(10));
        engine.evaluate(now(), None);

        let t = engine.snooze(now(), 5).unwrap();
        assert_eq!(engine.phase(), AlarmPhase::Armed);
        assert_eq!(engine.state().alarm_time, Some(now() + Duration::minutes(5)));
        assert_eq!(t.effects, vec![Effect::StopSound]);

        // Not re-triggered until the window is reached again.
        assert!(engine.evaluate(now() + Duration::seconds(1), None).is_empty());
        engine.evaluate(now() + Duration::minutes(4) + Duration::seconds(30), None);
        assert_eq!(engine.phase(), AlarmPhase::Triggered);
    }

    #[test]
    fn stop_disarms_and_clears_time() {
        let mut engine = armed(now() + Duration::seconds(10));
        engine.evaluate(now(), None);
        let t = engine.stop(now());
        assert_eq!(engine.phase(), AlarmPhase::Disarmed);
        assert_eq!(engine.state().alarm_time, None);
        assert_eq!(t.effects, vec![Effect::StopSound]);
    }

    #[test]
    fn snooze_requires_ringing_alarm() {
        let mut engine = armed(now() + Duration::hours(1));
        assert_eq!(engine.snooze(now(), 5).unwrap_err(), AlarmError::NotRinging);
    }

    #[test]
    fn goal_path_fires_once_per_session() {
        let mut engine = AlarmEngine::new(&AlarmConfig::default());
        assert!(engine.evaluate(now(), Some(&goal("s1", 7.9))).is_empty());

        let t = engine.evaluate(now(), Some(&goal("s1", 8.0)));
        assert_eq!(engine.state().reason, Some(TriggerReason::GoalReached));
        match &t.effects[1] {
            Effect::ShowPrompt(prompt) => {
                assert_eq!(prompt.title, "Sleep goal reached");
                assert_eq!(
                    prompt.actions,
                    vec![PromptAction::Snooze { minutes: 5 }, PromptAction::Stop]
                );
            }
            other => panic!("Expected prompt, got {other:?}"),
        }

        engine.stop(now());
        assert!(engine.evaluate(now(), Some(&goal("s1", 8.1))).is_empty());
        assert!(!engine.evaluate(now(), Some(&goal("s2", 8.0))).is_empty());
    }

    #[test]
    fn scheduled_reason_wins_when_both_paths_qualify() {
        let mut engine = armed(now() + Duration::seconds(5));
        let t = engine.evaluate(now(), Some(&goal("s1", 9.0)));
        assert!(matches!(
            t.events[0],
            Event::AlarmTriggered { reason: TriggerReason::Scheduled, .. }
        ));
    }

    #[test]
    fn set_alarm_rejects_past_time() {
        let mut engine = AlarmEngine::new(&AlarmConfig::default());
        assert!(matches!(
            engine.set_alarm(now() - Duration::minutes(1), now()),
            Err(AlarmError::InPast { .. })
        ));
    }

    #[test]
    fn state_roundtrips_through_store() {
        let store = crate::storage::MemoryStore::new();
        let mut engine = AlarmEngine::new(&AlarmConfig::default());
        engine.set_alarm(now() + Duration::hours(1), now()).unwrap();
        engine.save(&store).unwrap();

        let loaded = AlarmEngine::load(&store, &AlarmConfig::default()).unwrap();
        assert_eq!(loaded.state(), engine.state());
        assert_eq!(loaded.phase(), AlarmPhase::Armed);
    }

    #[test]
    fn scheduled_ring_past_goal_covers_the_goal_path() {
        let mut engine = armed(now() + Duration::seconds(5));
        let progress = goal("s1", 9.0);

        engine.evaluate(now(), Some(&progress));
        assert_eq!(engine.state().reason, Some(TriggerReason::Scheduled));

        engine.stop(now() + Duration::seconds(10));
        let after = engine.evaluate(now() + Duration::seconds(11), Some(&progress));
        assert!(after.is_empty());
        assert_eq!(engine.phase(), AlarmPhase::Disarmed);
    }

    #[test]
    fn oversized_trigger_window_is_clamped() {
        let config = AlarmConfig {
            trigger_window_secs: 9_223_372_036_854_776,
            ..AlarmConfig::default()
        };
        let mut engine = AlarmEngine::new(&config);
        engine
            .set_alarm(now() + Duration::hours(2), now())
            .unwrap();
        assert!(engine.evaluate(now(), None).is_empty());
        engine.evaluate(now() + Duration::minutes(61), None);
        assert_eq!(engine.phase(), AlarmPhase::Triggered);
    }

    #[test]
    fn reload_picks_up_state_written_elsewhere() {
        let store = crate::storage::MemoryStore::new();
        let mut ringing = armed(now() + Duration::seconds(5));
        ringing.evaluate(now(), None);

        let mut other = AlarmEngine::with_state(ringing.state().clone(), &AlarmConfig::default());
        other.snooze(now(), 5).unwrap();
        other.save(&store).unwrap();

        let previous = ringing.reload(&store).unwrap();
        assert!(previous.alarm_active);
        assert_eq!(ringing.phase(), AlarmPhase::Armed);
    }
}
