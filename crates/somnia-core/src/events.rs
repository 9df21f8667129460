use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmPhase, TriggerReason};
use crate::journal::BackendMode;
use crate::sleep::SleepQuality;

/// Every state change in the system produces an Event.
/// Front ends render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SleepStarted {
        session_id: String,
        at: DateTime<Utc>,
    },
    SleepEnded {
        session_id: String,
        duration_hours: f64,
        quality: SleepQuality,
        goal_met: bool,
        at: DateTime<Utc>,
    },
    SleepGoalChanged {
        goal_hours: f64,
        at: DateTime<Utc>,
    },
    SleepSnapshot {
        tracking: bool,
        session_id: Option<String>,
        started_at: Option<DateTime<Utc>>,
        current_duration_hours: f64,
        goal_hours: f64,
        at: DateTime<Utc>,
    },
    AlarmSet {
        alarm_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    AlarmDisabled {
        at: DateTime<Utc>,
    },
    AlarmTriggered {
        reason: TriggerReason,
        alarm_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    AlarmSnoozed {
        minutes: u32,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    AlarmStopped {
        at: DateTime<Utc>,
    },
    AlarmSnapshot {
        phase: AlarmPhase,
        alarm_time: Option<DateTime<Utc>>,
        reason: Option<TriggerReason>,
        at: DateTime<Utc>,
    },
    JournalModeChanged {
        mode: BackendMode,
        at: DateTime<Utc>,
    },
    JournalEntryAdded {
        id: String,
        at: DateTime<Utc>,
    },
    JournalEntryUpdated {
        id: String,
        at: DateTime<Utc>,
    },
    JournalEntryDeleted {
        id: String,
        at: DateTime<Utc>,
    },
}
