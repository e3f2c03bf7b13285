//! In-memory storage backend using dashmap.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::{KvBackend, StorageResult};

/// Sharded in-memory key-value backend.
///
/// Each shard has its own lock, so operations on unrelated keys do not
/// contend with each other.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        // The entry guard holds the shard lock across the check and the insert.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_and_get() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").await.unwrap();

        assert_eq!(backend.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").await.unwrap();
        backend.put("a", b"2").await.unwrap();

        assert_eq!(backend.get("a").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let backend = MemoryBackend::new();

        assert!(backend.put_if_absent("a", b"1").await.unwrap());
        assert!(!backend.put_if_absent("a", b"2").await.unwrap());
        assert_eq!(backend.get("a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").await.unwrap();

        assert!(backend.delete("a").await.unwrap());
        assert!(!backend.delete("a").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let backend = MemoryBackend::new();
        backend.put("session:1", b"x").await.unwrap();
        backend.put("session:2", b"y").await.unwrap();
        backend.put("account:alice", b"z").await.unwrap();

        let mut found = backend.scan_prefix("session:").await.unwrap();
        found.sort();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "session:1");
        assert_eq!(found[1].0, "session:2");
    }

    #[tokio::test]
    async fn test_concurrent_put_if_absent_single_winner() {
        let backend = Arc::new(MemoryBackend::new());

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend.put_if_absent("contested", &[i]).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
