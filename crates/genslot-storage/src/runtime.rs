//! Process-wide record store handle.
//!
//! The shell calls [`init`] once at start-up and [`teardown`] on exit, and
//! passes the handle down explicitly. Library code never reaches for it.

use crate::{create_record_store, RecordStore, StorageError, StorageResult};
use genslot_core::Config;
use std::sync::{Arc, OnceLock, RwLock};

static HANDLE: OnceLock<RwLock<Option<Arc<dyn RecordStore>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Arc<dyn RecordStore>>> {
    HANDLE.get_or_init(|| RwLock::new(None))
}

/// Install `store` as the process-wide handle, replacing any previous one.
pub fn install(store: Arc<dyn RecordStore>) -> StorageResult<Arc<dyn RecordStore>> {
    let mut guard = slot()
        .write()
        .map_err(|_| StorageError::ConfigError("record store handle poisoned".to_string()))?;
    if guard.is_some() {
        tracing::warn!("Replacing an already initialized record store");
    }
    *guard = Some(store.clone());
    Ok(store)
}

/// Build the configured store and install it.
pub async fn init(config: &Config) -> StorageResult<Arc<dyn RecordStore>> {
    let store = create_record_store(config).await?;
    install(store)
}

/// The installed store, or `NotInitialized`.
pub fn handle() -> StorageResult<Arc<dyn RecordStore>> {
    slot()
        .read()
        .map_err(|_| StorageError::ConfigError("record store handle poisoned".to_string()))?
        .clone()
        .ok_or(StorageError::NotInitialized)
}

/// Drop the installed store. Idempotent.
pub fn teardown() {
    if let Ok(mut guard) = slot().write() {
        if guard.take().is_some() {
            tracing::info!("Record store torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryRecordStore;
    use genslot_core::StorageBackend;

    // The handle is global, so the whole lifecycle is exercised in one test.
    #[tokio::test]
    async fn test_lifecycle() {
        teardown();
        assert!(matches!(handle(), Err(StorageError::NotInitialized)));

        install(Arc::new(MemoryRecordStore::new())).unwrap();
        let store = handle().unwrap();
        store.put("s", "a", serde_json::json!(1)).await.unwrap();
        assert_eq!(handle().unwrap().get_all("s").await.unwrap().len(), 1);

        let config = Config::default().with_storage(StorageBackend::Memory, "./unused");
        let fresh = init(&config).await.unwrap();
        assert!(fresh.get_all("s").await.unwrap().is_empty());

        teardown();
        teardown();
        assert!(matches!(handle(), Err(StorageError::NotInitialized)));
    }
}
