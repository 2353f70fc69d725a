//! In-memory entry store for development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{sort_for_status, EntryStore, StoreError};
use crate::core::entry::{Entry, EntryId, EntryStatus};

#[derive(Default)]
struct StoreState {
    entries: HashMap<EntryId, Entry>,
    next_number: Option<u64>,
    fail_updates: usize,
    pass_updates: usize,
}

/// Entry store kept in a `HashMap`.
#[derive(Default)]
pub struct InMemoryEntryStore {
    state: Mutex<StoreState>,
}

impl InMemoryEntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `update` fail.
    pub fn fail_next_updates(&self, count: usize) {
        self.fail_updates_after(0, count);
    }

    /// Let `passes` calls to `update` succeed, then fail the next `count`.
    pub fn fail_updates_after(&self, passes: usize, count: usize) {
        let mut state = self.state.lock();
        state.pass_updates = passes;
        state.fail_updates = count;
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::Duplicate(entry.id));
        }
        state.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        Ok(self.state.lock().entries.get(&id).cloned())
    }

    async fn update(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_updates > 0 {
            if state.pass_updates > 0 {
                state.pass_updates -= 1;
            } else {
                state.fail_updates -= 1;
                return Err(StoreError::Backend("injected update failure".into()));
            }
        }
        match state.entries.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(entry.id)),
        }
    }

    async fn delete(&self, id: EntryId) -> Result<bool, StoreError> {
        Ok(self.state.lock().entries.remove(&id).is_some())
    }

    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = self
            .state
            .lock()
            .entries
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        sort_for_status(&mut entries, status);
        Ok(entries)
    }

    async fn list_numbered_above(&self, number: u64) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = self
            .state
            .lock()
            .entries
            .values()
            .filter(|e| e.status.is_numbered() && e.post_number.is_some_and(|n| n > number))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.post_number);
        Ok(entries)
    }

    async fn load_next_number(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.state.lock().next_number)
    }

    async fn save_next_number(&self, next: u64) -> Result<(), StoreError> {
        self.state.lock().next_number = Some(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_scripted_update_failures() {
        let store = InMemoryEntryStore::new();
        let entry = Entry::new("hello", Utc::now());
        store.insert(&entry).await.unwrap();

        store.fail_updates_after(1, 1);
        store.update(&entry).await.unwrap();
        assert!(matches!(
            store.update(&entry).await,
            Err(StoreError::Backend(_))
        ));
        store.update(&entry).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
