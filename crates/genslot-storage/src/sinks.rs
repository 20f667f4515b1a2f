//! History and collection sinks over a [`RecordStore`].

use crate::{RecordStore, StorageResult, StoredRecord};
use genslot_core::models::{CollectionItem, HistoryEntry};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

pub const HISTORY_STORE: &str = "history";
pub const COLLECTION_STORE: &str = "collection";

fn decode_all<T: DeserializeOwned>(store: &str, records: Vec<StoredRecord>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record.data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    store = %store,
                    id = %record.id,
                    error = %e,
                    "Skipping record that does not match the expected shape"
                );
                None
            }
        })
        .collect()
}

/// Append-only log of completed generations.
#[derive(Clone)]
pub struct HistorySink {
    store: Arc<dyn RecordStore>,
}

impl HistorySink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, entry: &HistoryEntry) -> StorageResult<()> {
        self.store
            .put(HISTORY_STORE, &entry.id.to_string(), serde_json::to_value(entry)?)
            .await?;
        tracing::info!(
            history_id = %entry.id,
            mode = %entry.mode,
            results = entry.results.len(),
            "History entry written"
        );
        Ok(())
    }

    /// Entries, newest first
    pub async fn list(&self) -> StorageResult<Vec<HistoryEntry>> {
        let records = self.store.get_all(HISTORY_STORE).await?;
        Ok(decode_all(HISTORY_STORE, records))
    }

    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        self.store.delete(HISTORY_STORE, &id.to_string()).await
    }

    /// Delete several entries; returns how many existed.
    pub async fn delete_many(&self, ids: &[Uuid]) -> StorageResult<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete(*id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> StorageResult<usize> {
        self.store.clear(HISTORY_STORE).await
    }
}

/// Assets the user chose to keep.
#[derive(Clone)]
pub struct CollectionSink {
    store: Arc<dyn RecordStore>,
}

impl CollectionSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, item: &CollectionItem) -> StorageResult<()> {
        self.store
            .put(COLLECTION_STORE, &item.id.to_string(), serde_json::to_value(item)?)
            .await?;
        tracing::debug!(item_id = %item.id, file_name = ?item.file_name, "Collection item added");
        Ok(())
    }

    /// Items, newest first
    pub async fn list(&self) -> StorageResult<Vec<CollectionItem>> {
        let records = self.store.get_all(COLLECTION_STORE).await?;
        Ok(decode_all(COLLECTION_STORE, records))
    }

    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        self.store.delete(COLLECTION_STORE, &id.to_string()).await
    }

    pub async fn clear(&self) -> StorageResult<usize> {
        self.store.clear(COLLECTION_STORE).await
    }
}
