//! In-process cache store
//!
//! Backed by a `DashMap` so several mailboxes (and tasks) can share one store
//! handle. Values are cloned in and out, which mirrors a remote cache: a
//! mailbox never holds a live reference into the store.

use super::{CacheError, CacheStore, MailRecord};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<MailRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key directly, bypassing the async interface.
    pub fn insert(&self, key: impl Into<String>, records: Vec<MailRecord>) {
        self.entries.insert(key.into(), records);
    }

    /// Drop a key, the same way an expiry or eviction would.
    pub fn evict(&self, key: &str) -> Option<Vec<MailRecord>> {
        self.entries.remove(key).map(|(_, records)| records)
    }

    /// Current value under `key`, if any.
    pub fn snapshot(&self, key: &str) -> Option<Vec<MailRecord>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<MailRecord>>, CacheError> {
        Ok(self.snapshot(key))
    }

    async fn set(&self, key: &str, records: &[MailRecord]) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_whole_value() {
        let store = MemoryStore::new();
        store.insert(
            "a@b.com",
            vec![MailRecord::new(1, "one"), MailRecord::new(2, "two")],
        );

        store
            .set("a@b.com", &[MailRecord::new(3, "three")])
            .await
            .unwrap();

        let stored = store.get("a@b.com").await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message_id, 3);
    }

    #[tokio::test]
    async fn evicted_key_reads_as_absent() {
        let store = MemoryStore::new();
        store.insert("a@b.com", vec![MailRecord::new(1, "one")]);
        assert_eq!(store.len(), 1);

        store.evict("a@b.com");
        assert!(store.get("a@b.com").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
