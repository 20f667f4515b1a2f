//! Record store abstraction
//!
//! A record store is a set of named stores, each holding JSON records keyed
//! by id. Writes are atomic per record; nothing spans records.

use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genslot_core::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid store or record key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Record store not initialized")]
    NotInitialized,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => AppError::NotFound(format!("Record {} not found", id)),
            StorageError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// A record as held by a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub stored_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Keyed record store
///
/// Implemented by the in-memory and local filesystem backends. The rest of the
/// system only ever sees `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record `id` in `store`
    async fn put(&self, store: &str, id: &str, data: serde_json::Value) -> StorageResult<()>;

    /// All records in `store`, most recently stored first
    async fn get_all(&self, store: &str) -> StorageResult<Vec<StoredRecord>>;

    /// Remove one record. Returns whether it existed.
    async fn delete(&self, store: &str, id: &str) -> StorageResult<bool>;

    /// Remove every record in `store`. Returns how many were removed.
    async fn clear(&self, store: &str) -> StorageResult<usize>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject store names and ids that could escape their directory.
pub(crate) fn validate_key(kind: &str, key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.starts_with('.')
    {
        return Err(StorageError::InvalidKey(format!(
            "{} '{}' contains invalid characters",
            kind, key
        )));
    }
    Ok(())
}

/// Newest first; ties keep the later sequence number first.
pub(crate) fn sort_newest_first(records: &mut [(u64, StoredRecord)]) {
    records.sort_by(|(seq_a, a), (seq_b, b)| {
        b.stored_at
            .cmp(&a.stored_at)
            .then_with(|| seq_b.cmp(seq_a))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("store", "history").is_ok());
        assert!(validate_key("id", "5f0c6a0e-2a8b-4d7c-9d3e-1b2c3d4e5f60").is_ok());
        for bad in ["", "..", "../etc", "a/b", "a\\b", ".hidden"] {
            assert!(validate_key("id", bad).is_err(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_storage_error_maps_to_app_error() {
        let err: AppError = StorageError::NotFound("abc".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));
        let err: AppError = StorageError::WriteFailed("disk full".to_string()).into();
        assert!(matches!(err, AppError::Storage(ref msg) if msg.contains("disk full")));
    }
}
