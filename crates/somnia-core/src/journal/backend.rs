//! The capability both journal backends provide.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{EntryDraft, EntryPatch, JournalEntry};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Remote document store, pushed snapshots, no optimistic writes.
    Remote,
    /// Device-local list, published synchronously after each write.
    Local,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Remote => f.write_str("remote"),
            BackendMode::Local => f.write_str("local"),
        }
    }
}

/// What a backend pushes to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// Full contents of the collection, newest first.
    Data(Vec<JournalEntry>),
    Error(StoreError),
}

pub type SnapshotListener = Arc<dyn Fn(SnapshotEvent) + Send + Sync>;

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to a live subscription.
///
/// `unsubscribe` runs the teardown once; later calls do nothing. Dropping
/// the handle unsubscribes.
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn detached() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    pub fn unsubscribe(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A place journal entries live.
///
/// Writes return once the backend has accepted them. Whether the change is
/// visible to subscribers at that point depends on the backend.
pub trait JournalBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// Prepare the backend for use. Idempotent.
    fn activate(&self) -> Result<()>;

    /// Start pushing snapshots to `listener`.
    fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription>;

    /// Store a new entry and return its id.
    fn add(&self, draft: &EntryDraft, now: DateTime<Utc>) -> Result<String>;

    fn update(&self, id: &str, patch: &EntryPatch, now: DateTime<Utc>) -> Result<()>;

    fn delete(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
