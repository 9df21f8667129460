//! Remote journal backend over a document store.
//!
//! Entries live in `users/{uid}/entries`; the user's root document is
//! `users/{uid}`. Writes go straight to the store and the local view only
//! changes when the store pushes the next snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::backend::{BackendMode, JournalBackend, SnapshotEvent, SnapshotListener, Subscription};
use super::entry::{EntryDraft, EntryPatch, JournalEntry};
use crate::error::{CoreError, Result, StoreError};

/// A document as delivered by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: None,
        }
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }
}

pub type DataCallback = Box<dyn Fn(Vec<RawDocument>) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(StoreError) + Send + Sync>;

/// Adapter for a hosted document database.
pub trait DocumentStore: Send + Sync {
    /// Create the document at `path`, or merge `data` into it.
    fn create_or_merge_document(&self, path: &str, data: Value) -> Result<(), StoreError>;

    /// Add a document with a store-assigned id.
    fn add_document(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Merge `data` into an existing document.
    fn update_document(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Live query. An ordered query on a store without the matching index
    /// fails with [`StoreError::MissingIndex`].
    fn subscribe(
        &self,
        query: Query,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError>;
}

const CREATED_AT: &str = "createdAt";

pub struct RemoteBackend {
    store: Arc<dyn DocumentStore>,
    uid: String,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn DocumentStore>, uid: impl Into<String>) -> Self {
        Self {
            store,
            uid: uid.into(),
        }
    }

    pub fn root_path(&self) -> String {
        format!("users/{}", self.uid)
    }

    pub fn entries_collection(&self) -> String {
        format!("users/{}/entries", self.uid)
    }

    fn data_callback(listener: SnapshotListener, sort_client_side: bool) -> DataCallback {
        Box::new(move |docs| {
            let mut entries = decode_documents(docs);
            if sort_client_side {
                sort_newest_first(&mut entries);
            }
            listener(SnapshotEvent::Data(entries));
        })
    }

    fn error_callback(listener: SnapshotListener) -> ErrorCallback {
        Box::new(move |err| listener(SnapshotEvent::Error(err)))
    }
}

/// Map raw documents to entries, skipping any that do not decode.
fn decode_documents(docs: Vec<RawDocument>) -> Vec<JournalEntry> {
    docs.into_iter()
        .filter_map(|doc| match JournalEntry::from_document(&doc.id, &doc.data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "skipping malformed journal document");
                None
            }
        })
        .collect()
}

/// Stable, so equal timestamps keep delivery order.
fn sort_newest_first(entries: &mut [JournalEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl JournalBackend for RemoteBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    fn activate(&self) -> Result<()> {
        self.store
            .create_or_merge_document(&self.root_path(), json!({ "uid": self.uid }))?;
        info!(uid = %self.uid, "remote journal activated");
        Ok(())
    }

    fn subscribe(&self, listener: SnapshotListener) -> Result<Subscription> {
        let collection = self.entries_collection();
        let ordered = Query::collection(&collection).order_by_desc(CREATED_AT);

        match self.store.subscribe(
            ordered,
            Self::data_callback(Arc::clone(&listener), false),
            Self::error_callback(Arc::clone(&listener)),
        ) {
            Ok(sub) => {
                debug!(%collection, "subscribed to ordered journal query");
                Ok(sub)
            }
            Err(StoreError::MissingIndex { .. }) => {
                warn!(%collection, "ordered query needs an index; sorting client-side");
                let sub = self.store.subscribe(
                    Query::collection(&collection),
                    Self::data_callback(Arc::clone(&listener), true),
                    Self::error_callback(listener),
                )?;
                Ok(sub)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn add(&self, draft: &EntryDraft, now: DateTime<Utc>) -> Result<String> {
        let entry = JournalEntry::from_draft(String::new(), draft, now);
        let id = self
            .store
            .add_document(&self.entries_collection(), entry.to_document())?;
        info!(%id, "journal entry written to remote store");
        Ok(id)
    }

    fn update(&self, id: &str, patch: &EntryPatch, now: DateTime<Utc>) -> Result<()> {
        self.store
            .update_document(&self.entries_collection(), id, patch.to_fields(now))
            .map_err(|e| match e {
                StoreError::NotFound { id, .. } => CoreError::EntryNotFound(id),
                other => other.into(),
            })
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.store
            .delete_document(&self.entries_collection(), id)
            .map_err(|e| match e {
                StoreError::NotFound { id, .. } => CoreError::EntryNotFound(id),
                other => other.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::entry::Mood;
    use crate::journal::memory_store::MemoryDocumentStore;
    use crate::sleep::SleepQuality;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn collect() -> (SnapshotListener, Arc<Mutex<Vec<SnapshotEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: SnapshotListener = Arc::new(move |event| sink.lock().unwrap().push(event));
        (listener, seen)
    }

    fn draft(title: &str) -> EntryDraft {
        EntryDraft::new(title, "a dream", Mood::Neutral, SleepQuality::Fair)
    }

    #[test]
    fn activate_creates_root_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let backend = RemoteBackend::new(store.clone(), "u1");
        backend.activate().unwrap();
        backend.activate().unwrap();
        assert_eq!(store.document("users/u1"), Some(json!({ "uid": "u1" })));
    }

    #[test]
    fn missing_index_falls_back_to_client_sort() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.require_index(true);
        let backend = RemoteBackend::new(store.clone(), "u1");

        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap();
        backend.add(&draft("old"), t0).unwrap();
        backend.add(&draft("new"), t0 + chrono::Duration::hours(24)).unwrap();

        let (listener, seen) = collect();
        let _sub = backend.subscribe(listener).unwrap();
        store.flush();

        let seen = seen.lock().unwrap();
        match seen.last() {
            Some(SnapshotEvent::Data(entries)) => {
                let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
                assert_eq!(titles, vec!["new", "old"]);
            }
            other => panic!("expected data snapshot, got {other:?}"),
        }
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let docs = vec![
            RawDocument {
                id: "bad".into(),
                data: json!({ "title": 3 }),
            },
            RawDocument {
                id: "good".into(),
                data: JournalEntry::from_draft(String::new(), &draft("ok"), Utc::now())
                    .to_document(),
            },
        ];
        let entries = decode_documents(docs);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "good");
    }

    #[test]
    fn updating_unknown_entry_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::new());
        let backend = RemoteBackend::new(store, "u1");
        let err = backend
            .update("nope", &EntryPatch::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::EntryNotFound(id) if id == "nope"));
    }
}
