//! genslot storage library
//!
//! Keyed record stores (in-memory and local filesystem), the history and
//! collection sinks built on them, and the process-wide store handle.
//!
//! # Key format
//!
//! Records live at `{store}/{id}`. Store names and ids must not be empty and
//! must not contain `..`, path separators, or start with a dot.

pub mod factory;
pub mod local;
pub mod memory;
pub mod runtime;
pub mod sinks;
pub mod traits;

// Re-export commonly used types
pub use factory::create_record_store;
pub use genslot_core::StorageBackend;
pub use local::LocalRecordStore;
pub use memory::MemoryRecordStore;
pub use sinks::{CollectionSink, HistorySink, COLLECTION_STORE, HISTORY_STORE};
pub use traits::{RecordStore, StorageError, StorageResult, StoredRecord};
