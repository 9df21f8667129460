use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// User-rated sleep quality, shared by sleep sessions and journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Great,
    Excellent,
}

impl SleepQuality {
    pub const ALL: [SleepQuality; 5] = [
        SleepQuality::Poor,
        SleepQuality::Fair,
        SleepQuality::Good,
        SleepQuality::Great,
        SleepQuality::Excellent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SleepQuality::Poor => "Poor",
            SleepQuality::Fair => "Fair",
            SleepQuality::Good => "Good",
            SleepQuality::Great => "Great",
            SleepQuality::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SleepQuality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SleepQuality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "quality".into(),
                message: format!("'{s}' is not one of Poor, Fair, Good, Great, Excellent"),
            })
    }
}

/// One night of tracked sleep.
///
/// Open while `end_time` is `None`; immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub quality: Option<SleepQuality>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SleepSession {
    pub fn open(id: String, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            duration_hours: None,
            quality: None,
            notes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Hours elapsed between start and `at`, rounded to one decimal.
    pub fn elapsed_hours(&self, at: DateTime<Utc>) -> f64 {
        round_hours((at - self.start_time).num_milliseconds())
    }

    /// Close the session at `end_time`.
    pub fn close(mut self, end_time: DateTime<Utc>, quality: SleepQuality, notes: Option<String>) -> Self {
        self.duration_hours = Some(self.elapsed_hours(end_time));
        self.end_time = Some(end_time);
        self.quality = Some(quality);
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }
}

/// Whether a sleep session is in progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Tracking(SleepSession),
}

impl TrackingState {
    pub fn session(&self) -> Option<&SleepSession> {
        match self {
            TrackingState::Idle => None,
            TrackingState::Tracking(session) => Some(session),
        }
    }
}

/// `ms / 3_600_000` rounded to one decimal via `round(x * 10) / 10`.
/// Negative spans (clock moved backwards) count as zero.
pub fn round_hours(ms: i64) -> f64 {
    let hours = ms.max(0) as f64 / MS_PER_HOUR;
    (hours * 10.0).round() / 10.0
}
