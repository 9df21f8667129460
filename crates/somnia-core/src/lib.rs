//! # Somnia Core Library
//!
//! Core logic for the Somnia sleep companion: sleep tracking with goals and
//! streaks, a wake-up alarm with snooze, and a dream journal that syncs to a
//! remote document store when a user is signed in and falls back to
//! device-local storage otherwise. The `somnia-cli` binary is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Sleep Tracker**: single open session at a time, durations and stats
//!   derived from a persisted session list
//! - **Alarm Engine**: a pure state machine that is evaluated on every tick
//!   and emits [`alarm::Effect`]s instead of touching audio or UI
//! - **Journal Sync**: one active backend (remote or local) feeding a
//!   de-duplicated view of journal entries
//! - **Storage**: SQLite key-value persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`SleepTracker`]: sleep session state machine
//! - [`AlarmEngine`] / [`AlarmMonitor`]: alarm transitions and the tick loop
//! - [`JournalSync`]: journal backend selection and snapshot handling
//! - [`Database`]: durable key-value store
//! - [`Config`]: application configuration management
//! - [`Scheduler`]: periodic tasks, real or virtual time

pub mod alarm;
pub mod clock;
pub mod error;
pub mod events;
pub mod journal;
pub mod notifications;
pub mod scheduler;
pub mod sleep;
pub mod storage;

pub use alarm::{AlarmEngine, AlarmMonitor, AlarmPhase, AlarmState, Effect, TriggerReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    AlarmError, ConfigError, CoreError, DispatchError, SessionError, StorageError, StoreError,
    ValidationError,
};
pub use events::Event;
pub use journal::{BackendMode, EntryDraft, EntryPatch, JournalEntry, JournalSync, Mood};
pub use notifications::{Notification, NotificationCenter, NotificationKind, MAX_NOTIFICATIONS};
pub use scheduler::{CancelToken, ManualScheduler, Scheduler, TokioScheduler};
pub use sleep::{SleepQuality, SleepSchedule, SleepSession, SleepStats, SleepTracker};
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
