//! In-process document store.
//!
//! Behaves like a hosted store as far as the journal can tell: writes are
//! acknowledged immediately, but subscribers only see them when queued
//! snapshots are delivered with [`MemoryDocumentStore::flush`].

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::backend::Subscription;
use super::remote::{DataCallback, DocumentStore, ErrorCallback, Query, RawDocument};
use crate::error::StoreError;

struct Subscriber {
    id: u64,
    query: Query,
    on_data: Arc<DataCallback>,
    on_error: Arc<ErrorCallback>,
}

enum Delivery {
    Snapshot(u64),
    Raw(u64, Vec<RawDocument>),
    Error(u64, StoreError),
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<String, Value>,
    /// Collection name to documents in insertion order.
    collections: BTreeMap<String, Vec<RawDocument>>,
    subscribers: Vec<Subscriber>,
    queue: VecDeque<Delivery>,
}

impl Inner {
    fn enqueue_for(&mut self, collection: &str) {
        let ids: Vec<u64> = self
            .subscribers
            .iter()
            .filter(|s| s.query.collection == collection)
            .map(|s| s.id)
            .collect();
        self.queue.extend(ids.into_iter().map(Delivery::Snapshot));
    }

    fn snapshot(&self, query: &Query) -> Vec<RawDocument> {
        let mut docs = self
            .collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        if let Some(order) = &query.order_by {
            docs.sort_by_key(|d| field_time(&d.data, &order.field));
            if order.descending {
                docs.reverse();
            }
        }
        docs
    }
}

fn field_time(data: &Value, field: &str) -> Option<DateTime<Utc>> {
    data.get(field)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                target.insert(k, v);
            }
        }
        (target, patch) => *target = patch,
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
    next_subscriber: AtomicU64,
    require_index: AtomicBool,
    fail_writes: AtomicBool,
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocumentStore").finish_non_exhaustive()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject ordered queries as if no index existed.
    pub fn require_index(&self, missing: bool) {
        self.require_index.store(missing, Ordering::SeqCst);
    }

    /// Reject every write until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn document(&self, path: &str) -> Option<Value> {
        self.lock().documents.get(path).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn pending_deliveries(&self) -> usize {
        self.lock().queue.len()
    }

    /// Queue an arbitrary snapshot for every subscriber of `collection`.
    pub fn deliver_raw(&self, collection: &str, docs: Vec<RawDocument>) {
        let mut inner = self.lock();
        let ids: Vec<u64> = inner
            .subscribers
            .iter()
            .filter(|s| s.query.collection == collection)
            .map(|s| s.id)
            .collect();
        for id in ids {
            inner.queue.push_back(Delivery::Raw(id, docs.clone()));
        }
    }

    /// Queue a listener failure for every subscriber of `collection`.
    pub fn fail_subscriptions(&self, collection: &str, err: StoreError) {
        let mut inner = self.lock();
        let ids: Vec<u64> = inner
            .subscribers
            .iter()
            .filter(|s| s.query.collection == collection)
            .map(|s| s.id)
            .collect();
        for id in ids {
            inner.queue.push_back(Delivery::Error(id, err.clone()));
        }
    }

    /// Deliver every queued snapshot in order. Callbacks run without the
    /// store lock held. Returns how many were delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = {
                let mut inner = self.lock();
                let Some(delivery) = inner.queue.pop_front() else {
                    break;
                };
                let id = match &delivery {
                    Delivery::Snapshot(id) | Delivery::Raw(id, _) | Delivery::Error(id, _) => *id,
                };
                let Some(sub) = inner.subscribers.iter().find(|s| s.id == id) else {
                    continue;
                };
                let (on_data, on_error) = (Arc::clone(&sub.on_data), Arc::clone(&sub.on_error));
                match delivery {
                    Delivery::Snapshot(_) => {
                        let docs = inner.snapshot(&sub.query);
                        Ok((on_data, docs))
                    }
                    Delivery::Raw(_, docs) => Ok((on_data, docs)),
                    Delivery::Error(_, err) => Err((on_error, err)),
                }
            };
            match next {
                Ok((on_data, docs)) => on_data(docs),
                Err((on_error, err)) => on_error(err),
            }
            delivered += 1;
        }
        delivered
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("writes disabled".into()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create_or_merge_document(&self, path: &str, data: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let doc = inner
            .documents
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        merge(doc, data);
        Ok(())
    }

    fn add_document(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        self.check_writable()?;
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(RawDocument {
                id: id.clone(),
                data,
            });
        inner.enqueue_for(collection);
        Ok(id)
    }

    fn update_document(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge(&mut doc.data, data);
        inner.enqueue_for(collection);
        Ok(())
    }

    fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        inner.enqueue_for(collection);
        Ok(())
    }

    fn subscribe(
        &self,
        query: Query,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError> {
        if query.order_by.is_some() && self.require_index.load(Ordering::SeqCst) {
            return Err(StoreError::MissingIndex {
                collection: query.collection,
            });
        }

        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        {
            let mut inner = self.lock();
            inner.subscribers.push(Subscriber {
                id,
                query,
                on_data: Arc::new(on_data),
                on_error: Arc::new(on_error),
            });
            inner.queue.push_back(Delivery::Snapshot(id));
        }

        let inner: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.subscribers.retain(|s| s.id != id);
                let live: HashSet<u64> = inner.subscribers.iter().map(|s| s.id).collect();
                inner.queue.retain(|d| match d {
                    Delivery::Snapshot(id) | Delivery::Raw(id, _) | Delivery::Error(id, _) => {
                        live.contains(id)
                    }
                });
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (DataCallback, Arc<Mutex<Vec<Vec<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: DataCallback = Box::new(move |docs: Vec<RawDocument>| {
            sink.lock()
                .unwrap()
                .push(docs.into_iter().map(|d| d.id).collect());
        });
        (cb, seen)
    }

    #[test]
    fn writes_are_only_seen_after_flush() {
        let store = MemoryDocumentStore::new();
        let (on_data, seen) = recorder();
        let _sub = store
            .subscribe(Query::collection("c"), on_data, Box::new(|_| {}))
            .unwrap();

        let id = store.add_document("c", json!({})).unwrap();
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(store.flush(), 2);
        assert_eq!(seen.lock().unwrap().last(), Some(&vec![id]));
    }

    #[test]
    fn unsubscribed_listener_gets_nothing() {
        let store = MemoryDocumentStore::new();
        let (on_data, seen) = recorder();
        let sub = store
            .subscribe(Query::collection("c"), on_data, Box::new(|_| {}))
            .unwrap();
        store.add_document("c", json!({})).unwrap();

        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(store.flush(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn ordered_query_needs_index_when_required() {
        let store = MemoryDocumentStore::new();
        store.require_index(true);
        let result = store.subscribe(
            Query::collection("c").order_by_desc("createdAt"),
            Box::new(|_| {}),
            Box::new(|_| {}),
        );
        assert!(matches!(result, Err(StoreError::MissingIndex { .. })));
    }

    #[test]
    fn root_document_merges() {
        let store = MemoryDocumentStore::new();
        store
            .create_or_merge_document("users/u", json!({ "a": 1 }))
            .unwrap();
        store
            .create_or_merge_document("users/u", json!({ "b": 2 }))
            .unwrap();
        assert_eq!(store.document("users/u"), Some(json!({ "a": 1, "b": 2 })));
    }
}
