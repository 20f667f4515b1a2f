use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::storage_types::StorageBackend;

const MAX_SLOTS: usize = 10;
const MIN_SLOTS: usize = 1;
const POLL_INTERVAL_MS: u64 = 5000;
const MAX_POLLS: u32 = 120;
const MAX_POLL_DURATION_SECS: u64 = 900;
const SUBMIT_RETRIES: u32 = 2;
const VIDEO_MAX_DIMENSION: u32 = 1280;
const VIDEO_JPEG_QUALITY: u8 = 85;
const HTTP_TIMEOUT_SECS: u64 = 120;
const STORAGE_PATH: &str = "./data";

/// Runtime configuration.
///
/// Credentials are deliberately absent; see [`crate::settings::SettingsSource`].
#[derive(Debug, Clone)]
pub struct Config {
    environment: String,
    max_slots: usize,
    min_slots: usize,
    poll_interval_ms: u64,
    max_polls: u32,
    max_poll_duration_secs: u64,
    submit_retries: u32,
    video_max_dimension: u32,
    video_jpeg_quality: u8,
    http_timeout_secs: u64,
    storage_backend: StorageBackend,
    storage_path: PathBuf,
    image_api_url: Option<String>,
    vision_api_url: Option<String>,
    video_api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            max_slots: MAX_SLOTS,
            min_slots: MIN_SLOTS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_polls: MAX_POLLS,
            max_poll_duration_secs: MAX_POLL_DURATION_SECS,
            submit_retries: SUBMIT_RETRIES,
            video_max_dimension: VIDEO_MAX_DIMENSION,
            video_jpeg_quality: VIDEO_JPEG_QUALITY,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            storage_backend: StorageBackend::Local,
            storage_path: PathBuf::from(STORAGE_PATH),
            image_api_url: None,
            vision_api_url: None,
            video_api_url: None,
        }
    }
}

impl Config {
    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unparseable numbers fall back to
    /// their defaults; an unknown storage backend is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("GENSLOT_STORAGE_BACKEND") {
            Some(value) => value
                .parse::<StorageBackend>()
                .map_err(|e| AppError::Config(e.to_string()))?,
            None => StorageBackend::Local,
        };

        let config = Config {
            environment: lookup("GENSLOT_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
            max_slots: parse_or(&lookup, "GENSLOT_MAX_SLOTS", MAX_SLOTS),
            min_slots: parse_or(&lookup, "GENSLOT_MIN_SLOTS", MIN_SLOTS),
            poll_interval_ms: parse_or(&lookup, "GENSLOT_POLL_INTERVAL_MS", POLL_INTERVAL_MS),
            max_polls: parse_or(&lookup, "GENSLOT_MAX_POLLS", MAX_POLLS),
            max_poll_duration_secs: parse_or(
                &lookup,
                "GENSLOT_MAX_POLL_DURATION_SECS",
                MAX_POLL_DURATION_SECS,
            ),
            submit_retries: parse_or(&lookup, "GENSLOT_SUBMIT_RETRIES", SUBMIT_RETRIES),
            video_max_dimension: parse_or(
                &lookup,
                "GENSLOT_VIDEO_MAX_DIMENSION",
                VIDEO_MAX_DIMENSION,
            ),
            video_jpeg_quality: parse_or(&lookup, "GENSLOT_VIDEO_JPEG_QUALITY", VIDEO_JPEG_QUALITY),
            http_timeout_secs: parse_or(&lookup, "GENSLOT_HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
            storage_backend,
            storage_path: lookup("GENSLOT_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(STORAGE_PATH)),
            image_api_url: non_empty(lookup("GENSLOT_IMAGE_API_URL")),
            vision_api_url: non_empty(lookup("GENSLOT_VISION_API_URL")),
            video_api_url: non_empty(lookup("GENSLOT_VIDEO_API_URL")),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_slots == 0 {
            return Err(AppError::Config(
                "GENSLOT_MIN_SLOTS must be at least 1".to_string(),
            ));
        }
        if self.max_slots < self.min_slots {
            return Err(AppError::Config(format!(
                "GENSLOT_MAX_SLOTS ({}) must not be below GENSLOT_MIN_SLOTS ({})",
                self.max_slots, self.min_slots
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "GENSLOT_POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        if self.max_polls == 0 {
            return Err(AppError::Config(
                "GENSLOT_MAX_POLLS must be greater than 0".to_string(),
            ));
        }
        if self.video_max_dimension == 0 {
            return Err(AppError::Config(
                "GENSLOT_VIDEO_MAX_DIMENSION must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.video_jpeg_quality) {
            return Err(AppError::Config(
                "GENSLOT_VIDEO_JPEG_QUALITY must be between 1 and 100".to_string(),
            ));
        }
        for (key, url) in [
            ("GENSLOT_IMAGE_API_URL", &self.image_api_url),
            ("GENSLOT_VISION_API_URL", &self.vision_api_url),
            ("GENSLOT_VIDEO_API_URL", &self.video_api_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(AppError::Config(format!(
                        "{} must be an http(s) URL",
                        key
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn min_slots(&self) -> usize {
        self.min_slots
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_duration_secs)
    }

    pub fn submit_retries(&self) -> u32 {
        self.submit_retries
    }

    pub fn video_max_dimension(&self) -> u32 {
        self.video_max_dimension
    }

    pub fn video_jpeg_quality(&self) -> u8 {
        self.video_jpeg_quality
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }

    pub fn storage_path(&self) -> &PathBuf {
        &self.storage_path
    }

    pub fn image_api_url(&self) -> Option<&str> {
        self.image_api_url.as_deref()
    }

    pub fn vision_api_url(&self) -> Option<&str> {
        self.vision_api_url.as_deref()
    }

    pub fn video_api_url(&self) -> Option<&str> {
        self.video_api_url.as_deref()
    }

    pub fn with_storage(mut self, backend: StorageBackend, path: impl Into<PathBuf>) -> Self {
        self.storage_backend = backend;
        self.storage_path = path.into();
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}
