//! genslot infrastructure
//!
//! Process-level concerns shared by binaries. Library crates only emit
//! `tracing` events; installing a subscriber is left to whoever owns `main`.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
