//! Journal synchronization engine.
//!
//! `JournalSync` holds exactly one active [`JournalBackend`], chosen when
//! the identity is set: remote when a document store is configured and a
//! user is signed in, local otherwise. The exposed collection is only ever
//! replaced by backend snapshots, each de-duplicated by id. Snapshots from a
//! subscription that has since been torn down are dropped by generation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::{BackendMode, JournalBackend, SnapshotEvent, SnapshotListener, Subscription};
use super::entry::{EntryDraft, EntryPatch, JournalEntry};
use super::local::LocalBackend;
use super::remote::{DocumentStore, RemoteBackend};
use super::stats::{compute_journal_stats, JournalStats};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::storage::{JournalConfig, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Subscribed, no snapshot received yet.
    Connecting,
    Live,
    /// The listener reported an error; the view holds the last good snapshot.
    Degraded,
    Stopped,
}

/// Keep the first occurrence of each id, preserving order.
pub fn dedupe_by_id(entries: Vec<JournalEntry>) -> Vec<JournalEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Builds the backend for an identity.
#[derive(Clone)]
pub struct BackendSelector {
    local: Arc<dyn KeyValueStore>,
    remote: Option<Arc<dyn DocumentStore>>,
}

impl BackendSelector {
    pub fn local_only(local: Arc<dyn KeyValueStore>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn DocumentStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn select(&self, identity: Option<&str>) -> Arc<dyn JournalBackend> {
        match (&self.remote, identity) {
            (Some(store), Some(uid)) => Arc::new(RemoteBackend::new(Arc::clone(store), uid)),
            _ => Arc::new(LocalBackend::new(Arc::clone(&self.local))),
        }
    }
}

#[derive(Debug)]
struct View {
    generation: u64,
    entries: Vec<JournalEntry>,
    status: SyncStatus,
}

pub struct JournalSync {
    selector: BackendSelector,
    clock: Arc<dyn Clock>,
    config: JournalConfig,
    identity: Option<String>,
    backend: Arc<dyn JournalBackend>,
    subscription: Option<Subscription>,
    view: Arc<Mutex<View>>,
}

impl std::fmt::Debug for JournalSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalSync")
            .field("identity", &self.identity)
            .field("mode", &self.backend.mode())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl JournalSync {
    /// Select a backend for `identity`, activate it and subscribe.
    pub fn start(
        selector: BackendSelector,
        clock: Arc<dyn Clock>,
        config: JournalConfig,
        identity: Option<String>,
    ) -> Result<Self> {
        let backend = selector.select(identity.as_deref());
        let mut sync = Self {
            selector,
            clock,
            config,
            identity: None,
            backend,
            subscription: None,
            view: Arc::new(Mutex::new(View {
                generation: 0,
                entries: Vec::new(),
                status: SyncStatus::Stopped,
            })),
        };
        sync.connect(identity)?;
        Ok(sync)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn status(&self) -> SyncStatus {
        self.lock_view().status
    }

    /// The visible collection, newest first.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock_view().entries.clone()
    }

    pub fn entry(&self, id: &str) -> Option<JournalEntry> {
        self.lock_view().entries.iter().find(|e| e.id == id).cloned()
    }

    /// Like [`entry`](Self::entry), but a miss is an error.
    pub fn require_entry(&self, id: &str) -> Result<JournalEntry> {
        self.entry(id)
            .ok_or_else(|| CoreError::EntryNotFound(id.to_string()))
    }

    pub fn stats(&self) -> JournalStats {
        let view = self.lock_view();
        compute_journal_stats(
            &view.entries,
            self.clock.now(),
            self.config.recall_baseline_days,
        )
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Switch backends on sign-in or sign-out. A no-op for the current
    /// identity.
    pub fn set_identity(&mut self, identity: Option<String>) -> Result<Option<Event>> {
        if identity == self.identity && self.subscription.is_some() {
            return Ok(None);
        }
        self.backend = self.selector.select(identity.as_deref());
        self.connect(identity).map(Some)
    }

    /// Validated before anything is written. In remote mode the new entry
    /// shows up with the next pushed snapshot, not before.
    pub fn add_entry(&self, draft: &EntryDraft) -> Result<String> {
        draft.validate()?;
        self.backend.add(draft, self.clock.now())
    }

    pub fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        patch.validate()?;
        self.backend.update(id, patch, self.clock.now())
    }

    pub fn delete_entry(&self, id: &str) -> Result<()> {
        self.backend.delete(id)
    }

    /// Tear down the subscription. The view keeps its last contents.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.lock_view().status = SyncStatus::Stopped;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock_view(&self) -> std::sync::MutexGuard<'_, View> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn teardown(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
            debug!("journal subscription torn down");
        }
    }

    fn connect(&mut self, identity: Option<String>) -> Result<Event> {
        self.teardown();

        let generation = {
            let mut view = self.lock_view();
            view.generation += 1;
            view.entries.clear();
            view.status = SyncStatus::Connecting;
            view.generation
        };

        self.identity = identity;
        let mode = self.backend.mode();
        let subscription = self
            .backend
            .activate()
            .and_then(|()| self.backend.subscribe(self.listener(generation)));
        match subscription {
            Ok(sub) => self.subscription = Some(sub),
            Err(e) => {
                self.lock_view().status = SyncStatus::Stopped;
                return Err(e);
            }
        }

        info!(%mode, identity = ?self.identity, "journal sync started");
        Ok(Event::JournalModeChanged {
            mode,
            at: self.clock.now(),
        })
    }

    fn listener(&self, generation: u64) -> SnapshotListener {
        let view = Arc::clone(&self.view);
        Arc::new(move |event| {
            let mut view = view.lock().unwrap_or_else(PoisonError::into_inner);
            if view.generation != generation {
                debug!(generation, current = view.generation, "dropping stale snapshot");
                return;
            }
            match event {
                SnapshotEvent::Data(entries) => {
                    let before = entries.len();
                    view.entries = dedupe_by_id(entries);
                    if view.entries.len() != before {
                        warn!(
                            dropped = before - view.entries.len(),
                            "duplicate journal ids in snapshot"
                        );
                    }
                    view.status = SyncStatus::Live;
                    debug!(count = view.entries.len(), "journal snapshot applied");
                }
                SnapshotEvent::Error(e) => {
                    warn!(error = %e, "journal subscription failed; keeping last snapshot");
                    view.status = SyncStatus::Degraded;
                }
            }
        })
    }
}

impl Drop for JournalSync {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::journal::entry::Mood;
    use crate::sleep::SleepQuality;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn local_sync() -> JournalSync {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 7, 0, 0).unwrap());
        JournalSync::start(
            BackendSelector::local_only(Arc::new(MemoryStore::new())),
            Arc::new(clock),
            JournalConfig::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn dedupe_keeps_first_occurrence_in_order() {
        let draft = EntryDraft::new("t", "d", Mood::Happy, SleepQuality::Good);
        let now = Utc::now();
        let mut a = JournalEntry::from_draft("a".into(), &draft, now);
        let b = JournalEntry::from_draft("b".into(), &draft, now);
        let mut a2 = a.clone();
        a2.title = "duplicate".into();
        a.title = "first".into();

        let out = dedupe_by_id(vec![a, b, a2]);
        let ids: Vec<_> = out.iter().map(|e| (e.id.as_str(), e.title.as_str())).collect();
        assert_eq!(ids, vec![("a", "first"), ("b", "t")]);
    }

    #[test]
    fn without_remote_store_sync_is_local() {
        let sync = local_sync();
        assert_eq!(sync.mode(), BackendMode::Local);
        assert_eq!(sync.status(), SyncStatus::Live);
    }

    #[test]
    fn invalid_draft_is_rejected_before_write() {
        let sync = local_sync();
        let draft = EntryDraft::new("", "d", Mood::Happy, SleepQuality::Good);
        assert!(matches!(
            sync.add_entry(&draft),
            Err(CoreError::Validation(_))
        ));
        assert!(sync.entries().is_empty());
    }

    #[test]
    fn same_identity_is_a_noop() {
        let mut sync = local_sync();
        assert_eq!(sync.set_identity(None).unwrap(), None);
        assert!(sync.set_identity(Some("u1".into())).unwrap().is_some());
        // no remote store configured, so still local
        assert_eq!(sync.mode(), BackendMode::Local);
    }

    #[test]
    fn shutdown_stops_updates() {
        let mut sync = local_sync();
        sync.shutdown();
        assert_eq!(sync.status(), SyncStatus::Stopped);
        let draft = EntryDraft::new("t", "d", Mood::Happy, SleepQuality::Good);
        sync.add_entry(&draft).unwrap();
        assert!(sync.entries().is_empty());
    }
}
