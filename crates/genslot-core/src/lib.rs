//! genslot core library
//!
//! Domain models, error taxonomy, configuration and the settings source shared
//! by every genslot crate.

pub mod config;
pub mod error;
pub mod models;
pub mod settings;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use settings::{EnvSettings, MapSettings, SettingsSource};
pub use storage_types::StorageBackend;
