//! Device-local key-value persistence.
//!
//! Every value is a JSON document stored under one of the [`keys`]. The
//! SQLite [`Database`](super::Database) is the durable implementation;
//! [`MemoryStore`] backs tests and can be told to fail writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Keys used by the engines.
pub mod keys {
    pub const SLEEP_SESSIONS: &str = "sleep_sessions";
    pub const CURRENT_SLEEP: &str = "current_sleep";
    pub const SLEEP_GOAL: &str = "sleep_goal";
    pub const BEDTIME: &str = "bedtime";
    pub const WAKE_TIME: &str = "wake_time";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const JOURNAL_ENTRIES: &str = "journal_entries";
    pub const ALARM_STATE: &str = "alarm_state";
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value. Missing keys decode to `None`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::CorruptValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encode a value as JSON and write it.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::CorruptValue {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, &raw)
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                message: "store is read-only".into(),
            });
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
