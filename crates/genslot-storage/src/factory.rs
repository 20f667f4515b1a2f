use crate::{LocalRecordStore, MemoryRecordStore, RecordStore, StorageBackend, StorageResult};
use genslot_core::Config;
use std::sync::Arc;

/// Create a record store based on configuration
pub async fn create_record_store(config: &Config) -> StorageResult<Arc<dyn RecordStore>> {
    match config.storage_backend() {
        StorageBackend::Local => {
            let store = LocalRecordStore::new(config.storage_path().clone()).await?;
            tracing::info!(
                path = %config.storage_path().display(),
                "Using local record store"
            );
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::info!("Using in-memory record store");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}
