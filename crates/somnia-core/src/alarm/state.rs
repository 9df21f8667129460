use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the alarm is ringing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// The configured alarm time came within the trigger window.
    Scheduled,
    /// The open sleep session reached the sleep goal.
    GoalReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmPhase {
    Disarmed,
    Armed,
    Triggered,
}

/// Persistent alarm state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmState {
    #[serde(default)]
    pub alarm_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub alarm_enabled: bool,
    /// Ringing, awaiting snooze or stop.
    #[serde(default)]
    pub alarm_active: bool,
    #[serde(default)]
    pub reason: Option<TriggerReason>,
    /// Session for which the goal-reached alarm already rang.
    #[serde(default)]
    pub goal_fired_for: Option<String>,
}

impl AlarmState {
    pub fn phase(&self) -> AlarmPhase {
        if self.alarm_active {
            AlarmPhase::Triggered
        } else if self.alarm_enabled && self.alarm_time.is_some() {
            AlarmPhase::Armed
        } else {
            AlarmPhase::Disarmed
        }
    }
}
