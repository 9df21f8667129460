//! Core error types for somnia-core.
//!
//! Every fallible operation in the library returns one of the enums below.
//! State violations, validation failures and I/O failures are kept apart so
//! callers can decide which ones are fatal and which are only worth a notice.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for somnia-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Sleep-session state violations
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Alarm state violations
    #[error("Alarm error: {0}")]
    Alarm(#[from] AlarmError),

    /// Local persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote document store errors
    #[error("Remote store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Journal entry lookups that miss
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    /// Notification lookups that miss
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sleep-session state violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `start_sleep` called while another session is open.
    #[error("Already tracking sleep session {session_id}")]
    AlreadyTracking { session_id: String },

    /// `end_sleep` called with no open session.
    #[error("No open sleep session")]
    NoOpenSession,
}

/// Alarm state violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// Snooze requested while the alarm is not ringing.
    #[error("Alarm is not ringing")]
    NotRinging,

    /// Alarm time is not in the future.
    #[error("Alarm time {alarm_time} is not after {now}")]
    InPast {
        alarm_time: chrono::DateTime<chrono::Utc>,
        now: chrono::DateTime<chrono::Utc>,
    },

    /// Snooze length must be positive.
    #[error("Snooze length must be at least one minute")]
    InvalidSnooze,
}

/// Local key-value persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored value could not be (de)serialized
    #[error("Corrupt value under '{key}': {message}")]
    CorruptValue { key: String, message: String },

    /// Write rejected by the backing store
    #[error("Write to '{key}' failed: {message}")]
    WriteFailed { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Remote document store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An ordered query needs an index the store does not have.
    #[error("Query on '{collection}' requires a missing index")]
    MissingIndex { collection: String },

    /// Document does not exist
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the write
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is empty after trimming
    #[error("'{field}' must not be empty")]
    EmptyField { field: &'static str },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Side-effect dispatch failures. Logged, never propagated to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Sound could not be loaded or played
    #[error("Audio playback failed: {0}")]
    Audio(String),

    /// Prompt or notice could not be shown
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
