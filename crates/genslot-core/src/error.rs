//! Error types module
//!
//! Every failure a slot can run into is an `AppError`. The variants mirror the
//! taxonomy the orchestrator reasons about: local validation, credentials,
//! remote rejections, transport misses, codec failures, poll timeouts and the
//! slot store's own bookkeeping errors.
//!
//! Policy (retryability, log level, display text) is chosen in exactly one
//! place, [`app_error_static_metadata`] plus `client_message`, so the message a
//! failed slot shows is never decided ad hoc by a caller.

use std::io;

use crate::models::SlotStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for remote rejections and timeouts
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented and handled
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "AUTH_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether a later attempt may succeed without user action
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Message suitable for direct display on a failed slot
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the user
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation timed out after {polls} status checks ({elapsed_secs}s)")]
    Timeout { polls: u32, elapsed_secs: u64 },

    #[error("Slot capacity reached: at most {max} slots")]
    Capacity { max: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("At least {min} slot(s) must remain")]
    MinimumSlots { min: usize },

    #[error("Slot busy: {0}")]
    SlotBusy(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: SlotStatus, to: SlotStatus },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Validation(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, bool, LogLevel) {
    match err {
        AppError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Fill in the missing fields and run the slot again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnreadableFile(_) => (
            "UNREADABLE_FILE",
            false,
            Some("Choose a different image file"),
            false,
            LogLevel::Debug,
        ),
        AppError::Compression(_) => (
            "COMPRESSION_ERROR",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::Auth(_) => (
            "AUTH_ERROR",
            false,
            Some("Provide a valid API key in settings"),
            false,
            LogLevel::Debug,
        ),
        AppError::Quota(_) => (
            "QUOTA_EXCEEDED",
            false,
            Some("Check provider billing or wait for the limit to reset"),
            false,
            LogLevel::Warn,
        ),
        AppError::Provider(_) => (
            "PROVIDER_ERROR",
            false,
            Some("Adjust the prompt or inputs and try again"),
            false,
            LogLevel::Warn,
        ),
        AppError::Transport(_) => (
            "TRANSPORT_ERROR",
            true,
            Some("Check network connectivity and retry"),
            false,
            LogLevel::Error,
        ),
        AppError::Timeout { .. } => (
            "POLL_TIMEOUT",
            false,
            Some("Run the slot again later"),
            false,
            LogLevel::Warn,
        ),
        AppError::Capacity { .. } => (
            "SLOT_CAPACITY",
            false,
            Some("Remove a slot before adding another"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the slot or record ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::MinimumSlots { .. } => (
            "MINIMUM_SLOTS",
            false,
            Some("Clear the slot instead of removing it"),
            false,
            LogLevel::Debug,
        ),
        AppError::SlotBusy(_) => (
            "SLOT_BUSY",
            false,
            Some("Wait for the running job to finish or clear the slot"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidTransition { .. } => (
            "INVALID_TRANSITION",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Fix the configuration and restart"),
            false,
            LogLevel::Error,
        ),
        AppError::Internal(_) => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::UnreadableFile(_) => "UnreadableFile",
            AppError::Compression(_) => "Compression",
            AppError::Auth(_) => "Auth",
            AppError::Quota(_) => "Quota",
            AppError::Provider(_) => "Provider",
            AppError::Transport(_) => "Transport",
            AppError::Timeout { .. } => "Timeout",
            AppError::Capacity { .. } => "Capacity",
            AppError::NotFound(_) => "NotFound",
            AppError::MinimumSlots { .. } => "MinimumSlots",
            AppError::SlotBusy(_) => "SlotBusy",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::Storage(_) => "Storage",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Whether the orchestrator may resubmit automatically.
    ///
    /// Only network-level failures qualify. Auth, quota, validation and
    /// provider rejections are terminal on first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ref msg) => msg.clone(),
            AppError::UnreadableFile(ref msg) => format!("Could not read file: {}", msg),
            AppError::Compression(ref msg) => format!("Could not prepare image: {}", msg),
            AppError::Auth(ref msg) => msg.clone(),
            // Remote rejections are surfaced verbatim
            AppError::Quota(ref msg) => msg.clone(),
            AppError::Provider(ref msg) => msg.clone(),
            AppError::Transport(ref msg) => format!("Network error: {}", msg),
            AppError::Timeout {
                polls,
                elapsed_secs,
            } => format!(
                "Generation timed out after {} status checks ({}s)",
                polls, elapsed_secs
            ),
            AppError::Capacity { max } => format!("Slot limit of {} reached", max),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::MinimumSlots { min } => {
                format!("At least {} slot(s) must remain", min)
            }
            AppError::SlotBusy(ref msg) => msg.clone(),
            AppError::InvalidTransition { from, to } => {
                format!("Slot cannot move from {} to {}", from, to)
            }
            AppError::Storage(_) => "Failed to access local storage".to_string(),
            AppError::Config(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal error".to_string(),
            AppError::InternalWithSource { .. } => "Internal error".to_string(),
        }
    }
}
