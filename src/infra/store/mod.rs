//! Entry store backends.
//!
//! The store is the system of record for pending and denied entries and a
//! mirror of the posting surface for scheduled and published ones. It also
//! persists the sequence ledger's counter between restarts.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::entry::{Entry, EntryId, EntryStatus};

pub use memory::InMemoryEntryStore;
pub use sqlite::SqliteEntryStore;

/// Errors raised by entry stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entry with this id already exists.
    #[error("entry {0} already exists")]
    Duplicate(EntryId),
    /// The entry to update does not exist.
    #[error("entry {0} does not exist")]
    Missing(EntryId),
    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Backend-specific failure with context.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Durable record of entries keyed by id.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new entry.
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError>;

    /// Fetch one entry.
    async fn get(&self, id: EntryId) -> Result<Option<Entry>, StoreError>;

    /// Replace an existing entry.
    async fn update(&self, entry: &Entry) -> Result<(), StoreError>;

    /// Remove an entry; returns whether it existed.
    async fn delete(&self, id: EntryId) -> Result<bool, StoreError>;

    /// Entries in `status`. Numbered statuses are ordered by slot, the others
    /// by creation time.
    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<Entry>, StoreError>;

    /// Scheduled or published entries numbered strictly above `number`,
    /// ordered by number.
    async fn list_numbered_above(&self, number: u64) -> Result<Vec<Entry>, StoreError>;

    /// Persisted next-number counter, if one was ever saved.
    async fn load_next_number(&self) -> Result<Option<u64>, StoreError>;

    /// Persist the next-number counter.
    async fn save_next_number(&self, next: u64) -> Result<(), StoreError>;

    /// All scheduled and published entries ordered by slot.
    async fn list_numbered(&self) -> Result<Vec<Entry>, StoreError> {
        let mut entries = self.list_by_status(EntryStatus::Published).await?;
        entries.extend(self.list_by_status(EntryStatus::Scheduled).await?);
        entries.sort_by_key(|e| (e.scheduled_time, e.post_number));
        Ok(entries)
    }
}

#[async_trait]
impl<T: EntryStore + ?Sized> EntryStore for Arc<T> {
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError> {
        (**self).insert(entry).await
    }

    async fn get(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        (**self).get(id).await
    }

    async fn update(&self, entry: &Entry) -> Result<(), StoreError> {
        (**self).update(entry).await
    }

    async fn delete(&self, id: EntryId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<Entry>, StoreError> {
        (**self).list_by_status(status).await
    }

    async fn list_numbered_above(&self, number: u64) -> Result<Vec<Entry>, StoreError> {
        (**self).list_numbered_above(number).await
    }

    async fn load_next_number(&self) -> Result<Option<u64>, StoreError> {
        (**self).load_next_number().await
    }

    async fn save_next_number(&self, next: u64) -> Result<(), StoreError> {
        (**self).save_next_number(next).await
    }
}

fn sort_for_status(entries: &mut [Entry], status: EntryStatus) {
    if status.is_numbered() {
        entries.sort_by_key(|e| (e.scheduled_time, e.post_number));
    } else {
        entries.sort_by_key(|e| e.created_at);
    }
}
