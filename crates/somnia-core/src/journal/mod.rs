//! Dream journal: entries, the two storage backends and the sync engine
//! that exposes one de-duplicated view over whichever backend is active.

mod backend;
mod entry;
mod local;
mod memory_store;
mod remote;
mod stats;
mod sync;

pub use backend::{BackendMode, JournalBackend, SnapshotEvent, SnapshotListener, Subscription};
pub use entry::{parse_tags, EntryDraft, EntryPatch, JournalEntry, Mood};
pub use local::LocalBackend;
pub use memory_store::MemoryDocumentStore;
pub use remote::{
    DataCallback, DocumentStore, ErrorCallback, OrderBy, Query, RawDocument, RemoteBackend,
};
pub use stats::{compute_journal_stats, JournalStats};
pub use sync::{dedupe_by_id, BackendSelector, JournalSync, SyncStatus};
