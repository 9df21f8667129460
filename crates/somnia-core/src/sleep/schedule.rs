//! Planned bedtime and wake time.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, ValidationError};
use crate::storage::{keys, load_json, save_json, KeyValueStore};

const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSchedule {
    pub bedtime: NaiveTime,
    pub wake_time: NaiveTime,
}

impl Default for SleepSchedule {
    fn default() -> Self {
        Self {
            bedtime: NaiveTime::from_hms_opt(22, 30, 0).unwrap_or_default(),
            wake_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
        }
    }
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).map_err(|e| ValidationError::InvalidValue {
        field: "time".into(),
        message: format!("'{raw}' is not HH:MM ({e})"),
    })
}

impl SleepSchedule {
    /// Load from the `bedtime`/`wake_time` keys, defaulting missing halves.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let defaults = Self::default();
        let read = |key: &str, fallback: NaiveTime| -> Result<NaiveTime, StorageError> {
            match load_json::<String>(store, key)? {
                Some(raw) => parse_clock_time(&raw).map_err(|e| StorageError::CorruptValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
                None => Ok(fallback),
            }
        };
        Ok(Self {
            bedtime: read(keys::BEDTIME, defaults.bedtime)?,
            wake_time: read(keys::WAKE_TIME, defaults.wake_time)?,
        })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        save_json(store, keys::BEDTIME, &self.bedtime.format(TIME_FORMAT).to_string())?;
        save_json(store, keys::WAKE_TIME, &self.wake_time.format(TIME_FORMAT).to_string())
    }

    /// Hours between bedtime and wake time, wrapping past midnight.
    pub fn planned_hours(&self) -> f64 {
        let mut span = self.wake_time - self.bedtime;
        if span <= Duration::zero() {
            span += Duration::days(1);
        }
        (span.num_minutes() as f64 / 60.0 * 10.0).round() / 10.0
    }

    /// The next instant (strictly after `now`) that matches the wake time.
    pub fn next_wake_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.wake_time).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn planned_hours_wraps_midnight() {
        let schedule = SleepSchedule::default();
        assert_eq!(schedule.planned_hours(), 8.5);
    }

    #[test]
    fn next_wake_time_rolls_to_tomorrow() {
        let schedule = SleepSchedule::default();
        let evening = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        assert_eq!(
            schedule.next_wake_time(evening),
            Utc.with_ymd_and_hms(2024, 3, 2, 7, 0, 0).unwrap()
        );
        let early = Utc.with_ymd_and_hms(2024, 3, 2, 5, 0, 0).unwrap();
        assert_eq!(
            schedule.next_wake_time(early),
            Utc.with_ymd_and_hms(2024, 3, 2, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(SleepSchedule::load(&store).unwrap(), SleepSchedule::default());

        let schedule = SleepSchedule {
            bedtime: parse_clock_time("23:15").unwrap(),
            wake_time: parse_clock_time("06:45").unwrap(),
        };
        schedule.save(&store).unwrap();
        assert_eq!(store.get(keys::WAKE_TIME).unwrap().as_deref(), Some("\"06:45\""));
        assert_eq!(SleepSchedule::load(&store).unwrap(), schedule);
    }

    #[test]
    fn rejects_malformed_time() {
        assert!(parse_clock_time("7am").is_err());
        assert!(parse_clock_time("25:00").is_err());
    }
}
