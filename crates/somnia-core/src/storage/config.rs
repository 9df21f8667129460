//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default sleep goal and statistics window
//! - Alarm sound, snooze length and polling period
//! - Journal statistics baseline
//! - Notification preferences
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// Longest accepted `alarm.trigger_window_secs`.
pub const MAX_TRIGGER_WINDOW_SECS: u64 = 3600;

/// Longest accepted `alarm.tick_secs`.
pub const MAX_TICK_SECS: u64 = 3600;

/// Sleep tracking defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepConfig {
    /// Goal used until the user sets one explicitly.
    #[serde(default = "default_goal_hours")]
    pub default_goal_hours: f64,
    #[serde(default = "default_stats_window")]
    pub stats_window_days: u32,
}

/// Alarm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_sound")]
    pub sound: String,
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    /// Alarm polling period.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// How far ahead of `alarm_time` the alarm may fire.
    #[serde(default = "default_trigger_window_secs")]
    pub trigger_window_secs: u64,
}

/// Journal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_recall_baseline")]
    pub recall_baseline_days: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Off suppresses notices. The alarm itself still rings.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Alarm volume, 0 to 100.
    #[serde(default = "default_50")]
    pub volume: u32,
    #[serde(default = "default_true")]
    pub vibration: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sleep: SleepConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_goal_hours() -> f64 {
    8.0
}
fn default_stats_window() -> u32 {
    7
}
fn default_sound() -> String {
    "gentle_chime".into()
}
fn default_snooze_minutes() -> u32 {
    5
}
fn default_tick_secs() -> u64 {
    1
}
fn default_trigger_window_secs() -> u64 {
    60
}
fn default_recall_baseline() -> u32 {
    30
}
fn default_true() -> bool {
    true
}
fn default_50() -> u32 {
    50
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            default_goal_hours: default_goal_hours(),
            stats_window_days: default_stats_window(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sound: default_sound(),
            snooze_minutes: default_snooze_minutes(),
            tick_secs: default_tick_secs(),
            trigger_window_secs: default_trigger_window_secs(),
        }
    }
}

impl AlarmConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs.clamp(1, MAX_TICK_SECS))
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            recall_baseline_days: default_recall_baseline(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 50,
            vibration: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(n) => {
                        if n.is_f64() {
                            let parsed = value.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                            serde_json::Number::from_f64(parsed)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            let parsed = value.parse::<u64>().map_err(|e| invalid(e.to_string()))?;
                            serde_json::Value::Number(parsed.into())
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the default if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg = toml::from_str::<Config>(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let goal = self.sleep.default_goal_hours;
        if !(goal > 0.0 && goal <= 24.0) {
            return Err(ConfigError::InvalidValue {
                key: "sleep.default_goal_hours".into(),
                message: format!("{goal} is outside (0, 24]"),
            });
        }
        if self.alarm.snooze_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "alarm.snooze_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        let tick = self.alarm.tick_secs;
        if !(1..=MAX_TICK_SECS).contains(&tick) {
            return Err(ConfigError::InvalidValue {
                key: "alarm.tick_secs".into(),
                message: format!("{tick} is outside [1, {MAX_TICK_SECS}]"),
            });
        }
        let window = self.alarm.trigger_window_secs;
        if window > MAX_TRIGGER_WINDOW_SECS {
            return Err(ConfigError::InvalidValue {
                key: "alarm.trigger_window_secs".into(),
                message: format!("{window} is above {MAX_TRIGGER_WINDOW_SECS}"),
            });
        }
        if self.journal.recall_baseline_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "journal.recall_baseline_days".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.notifications.volume > 100 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.volume".into(),
                message: format!("{} is above 100", self.notifications.volume),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. The config is left untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sleep.default_goal_hours, 8.0);
        assert_eq!(parsed.alarm.snooze_minutes, 5);
        assert_eq!(parsed.journal.recall_baseline_days, 30);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[alarm]\nsound = \"birds\"\n").unwrap();
        assert_eq!(parsed.alarm.sound, "birds");
        assert_eq!(parsed.alarm.tick_secs, 1);
        assert_eq!(parsed.sleep.stats_window_days, 7);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("alarm.snooze_minutes").as_deref(), Some("5"));
        assert_eq!(cfg.get("alarm.sound").as_deref(), Some("gentle_chime"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert!(cfg.get("alarm.missing_key").is_none());
    }

    #[test]
    fn set_updates_float_and_integer_fields() {
        let mut cfg = Config::default();
        cfg.set("sleep.default_goal_hours", "7.5").unwrap();
        cfg.set("alarm.snooze_minutes", "10").unwrap();
        assert_eq!(cfg.sleep.default_goal_hours, 7.5);
        assert_eq!(cfg.alarm.snooze_minutes, 10);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("alarm.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type_and_leaves_config_untouched() {
        let mut cfg = Config::default();
        assert!(cfg.set("notifications.enabled", "not_a_bool").is_err());
        assert!(cfg.set("sleep.default_goal_hours", "30").is_err());
        assert_eq!(cfg.sleep.default_goal_hours, 8.0);
        assert!(cfg.notifications.enabled);
    }

    #[test]
    fn load_from_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.alarm.trigger_window_secs, 60);
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("alarm.sound", "birds").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().alarm.sound, "birds");
    }

    #[test]
    fn alarm_periods_are_bounded() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("alarm.trigger_window_secs", "9223372036854776"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("alarm.tick_secs", "0").is_err());
        assert!(cfg.set("alarm.tick_secs", "86400").is_err());
        cfg.set("alarm.trigger_window_secs", "120").unwrap();
        assert_eq!(cfg.alarm.trigger_window_secs, 120);
    }

    #[test]
    fn out_of_range_values_in_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[alarm]\ntrigger_window_secs = 999999\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[notifications]\nvolume = 101\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
