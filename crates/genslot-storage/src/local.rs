use crate::traits::{
    sort_newest_first, validate_key, RecordStore, StorageError, StorageResult, StoredRecord,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// On-disk envelope of one record
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    id: String,
    stored_at: DateTime<Utc>,
    #[serde(default)]
    seq: u64,
    data: serde_json::Value,
}

/// Local filesystem record store
///
/// Layout: `{base_path}/{store}/{id}.json`. Each record is written to a
/// temporary file and renamed into place, so readers see either the old or the
/// new record, never a partial one.
#[derive(Debug)]
pub struct LocalRecordStore {
    base_path: PathBuf,
    seq: AtomicU64,
}

impl LocalRecordStore {
    /// Create a new LocalRecordStore rooted at `base_path`, creating it if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        // Sequence numbers only break ties between equal timestamps; seeding
        // from the clock keeps them increasing across restarts.
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64;

        Ok(LocalRecordStore {
            base_path,
            seq: AtomicU64::new(seed),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn store_dir(&self, store: &str) -> StorageResult<PathBuf> {
        validate_key("store", store)?;
        Ok(self.base_path.join(store))
    }

    fn record_path(&self, store: &str, id: &str) -> StorageResult<PathBuf> {
        validate_key("record id", id)?;
        Ok(self.store_dir(store)?.join(format!("{}.json", id)))
    }

    async fn read_record(path: &Path) -> StorageResult<RecordFile> {
        let raw = fs::read(path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn put(&self, store: &str, id: &str, data: serde_json::Value) -> StorageResult<()> {
        let path = self.record_path(store, id)?;
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let record = RecordFile {
            id: id.to_string(),
            stored_at: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            data,
        };
        let bytes = serde_json::to_vec(&record)?;

        let tmp_path = dir.join(format!(".{}.json.tmp", id));
        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create {}: {}", tmp_path.display(), e))
        })?;
        file.write_all(&bytes).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to move {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            store = %store,
            id = %id,
            size_bytes = bytes.len(),
            "Local record stored"
        );

        Ok(())
    }

    async fn get_all(&self, store: &str) -> StorageResult<Vec<StoredRecord>> {
        let dir = self.store_dir(store)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to list {}: {}", dir.display(), e))
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(file) => records.push((
                    file.seq,
                    StoredRecord {
                        id: file.id,
                        stored_at: file.stored_at,
                        data: file.data,
                    },
                )),
                Err(e) => {
                    // One corrupt file must not hide the rest of the store
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable record"
                    );
                }
            }
        }

        sort_newest_first(&mut records);
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    async fn delete(&self, store: &str, id: &str) -> StorageResult<bool> {
        let path = self.record_path(store, id)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete {}: {}", path.display(), e))
        })?;

        tracing::debug!(store = %store, id = %id, "Local record deleted");
        Ok(true)
    }

    async fn clear(&self, store: &str) -> StorageResult<usize> {
        let dir = self.store_dir(store)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(0);
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to list {}: {}", dir.display(), e))
        })?;

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            fs::remove_file(&path).await.map_err(|e| {
                StorageError::DeleteFailed(format!("Failed to delete {}: {}", path.display(), e))
            })?;
            if !entry.file_name().to_string_lossy().starts_with('.') {
                removed += 1;
            }
        }

        tracing::info!(store = %store, removed = removed, "Local store cleared");
        Ok(removed)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
