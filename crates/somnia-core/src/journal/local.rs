//! Device-local journal backend.
//!
//! The whole collection is one JSON list under `journal_entries`, newest
//! first. Every write persists the new list and then publishes it to all
//! subscribers before returning, so callers see their change immediately.
//! A failed write publishes nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::info;

use super::backend::{BackendMode, JournalBackend, SnapshotEvent, SnapshotListener, Subscription};
use super::entry::{EntryDraft, EntryPatch, JournalEntry};
use crate::error::{CoreError, Result};
use crate::storage::{keys, load_json, save_json, KeyValueStore};

type Listeners = Arc<Mutex<Vec<(u64, SnapshotListener)>>>;

pub struct LocalBackend {
    store: Arc<dyn KeyValueStore>,
    listeners: Listeners,
    next_listener: AtomicU64,
    /// Serializes read-modify-write cycles on the list.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend").finish_non_exhaustive()
    }
}

impl LocalBackend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            listeners: Arc::default(),
            next_listener: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Result<Vec<JournalEntry>> {
        Ok(load_json(self.store.as_ref(), keys::JOURNAL_ENTRIES)?.unwrap_or_default())
    }

    fn publish(&self, entries: &[JournalEntry]) {
        let listeners: Vec<SnapshotListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(SnapshotEvent::Data(entries.to_vec()));
        }
    }

    /// Load, change, persist, publish. Nothing is published if `change` or
    /// the write fails.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<JournalEntry>) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        let out = change(&mut entries)?;
        save_json(self.store.as_ref(), keys::JOURNAL_ENTRIES, &entries)?;
        self.publish(&entries);
        Ok(out)
    }
}

/// Millisecond token strictly greater than every numeric id already used.
fn next_id(now: DateTime<Utc>, entries: &[JournalEntry]) -> String {
    let newest = entries
        .iter()
        .filter_map(|e| e.id.parse::<i64>().ok())
        .max()
        .unwrap_or(i64::MIN);
    now.timestamp_millis().max(newest.saturating_add(1)).to_string()
}

impl JournalBackend for LocalBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Local
    }

    fn activate(&self) -> Result<()> {
        let count = self.load()?.len();
        info!(count, "local journal activated");
        Ok(())
    }

    /// The current list is pushed to `listener` before this returns.
    fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription> {
        let entries = self.load()?;
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::clone(&listener)));
        listener(SnapshotEvent::Data(entries));

        let listeners = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(l, _)| *l != id);
            }
        }))
    }

    fn add(&self, draft: &EntryDraft, now: DateTime<Utc>) -> Result<String> {
        let id = self.mutate(|entries| {
            let entry = JournalEntry::from_draft(next_id(now, entries), draft, now);
            let id = entry.id.clone();
            entries.insert(0, entry);
            Ok(id)
        })?;
        info!(%id, "journal entry saved locally");
        Ok(id)
    }

    fn update(&self, id: &str, patch: &EntryPatch, now: DateTime<Utc>) -> Result<()> {
        self.mutate(|entries| {
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| CoreError::EntryNotFound(id.to_string()))?;
            patch.apply_to(entry, now);
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() == before {
                return Err(CoreError::EntryNotFound(id.to_string()));
            }
            Ok(())
        })
    }
}
