use crate::traits::{sort_newest_first, RecordStore, StorageResult, StoredRecord};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

type Store = HashMap<String, (u64, StoredRecord)>;

/// In-memory record store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryRecordStore {
    stores: RwLock<HashMap<String, Store>>,
    seq: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, store: &str, id: &str, data: serde_json::Value) -> StorageResult<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let record = StoredRecord {
            id: id.to_string(),
            stored_at: Utc::now(),
            data,
        };

        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default()
            .insert(id.to_string(), (seq, record));

        tracing::debug!(store = %store, id = %id, "Memory store put");
        Ok(())
    }

    async fn get_all(&self, store: &str) -> StorageResult<Vec<StoredRecord>> {
        let stores = self.stores.read().await;
        let mut records: Vec<(u64, StoredRecord)> = stores
            .get(store)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    async fn delete(&self, store: &str, id: &str) -> StorageResult<bool> {
        let mut stores = self.stores.write().await;
        Ok(stores
            .get_mut(store)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn clear(&self, store: &str) -> StorageResult<usize> {
        let mut stores = self.stores.write().await;
        Ok(stores.remove(store).map(|records| records.len()).unwrap_or(0))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_all_newest_first() {
        let store = MemoryRecordStore::new();
        store.put("history", "a", json!({"n": 1})).await.unwrap();
        store.put("history", "b", json!({"n": 2})).await.unwrap();
        store.put("history", "c", json!({"n": 3})).await.unwrap();
        store.put("collection", "x", json!({})).await.unwrap();

        let ids: Vec<String> = store
            .get_all("history")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(store.get_all("collection").await.unwrap().len(), 1);
        assert!(store.get_all("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_and_moves_to_front() {
        let store = MemoryRecordStore::new();
        store.put("s", "a", json!(1)).await.unwrap();
        store.put("s", "b", json!(2)).await.unwrap();
        store.put("s", "a", json!(3)).await.unwrap();

        let records = store.get_all("s").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].data, json!(3));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = MemoryRecordStore::new();
        store.put("s", "a", json!(1)).await.unwrap();
        store.put("s", "b", json!(2)).await.unwrap();

        assert!(store.delete("s", "a").await.unwrap());
        assert!(!store.delete("s", "a").await.unwrap());
        assert_eq!(store.clear("s").await.unwrap(), 1);
        assert_eq!(store.clear("s").await.unwrap(), 0);
        assert_eq!(store.backend_type(), StorageBackend::Memory);
    }
}
