//! Read-only access to credentials and model selection.
//!
//! Providers read these at call time rather than at construction, so a key
//! entered after start-up is picked up by the next run.

use std::collections::HashMap;
use std::env;

use crate::error::AppError;

pub const IMAGE_API_KEY: &str = "IMAGE_API_KEY";
pub const IMAGE_MODEL: &str = "IMAGE_MODEL";
pub const VISION_API_KEY: &str = "VISION_API_KEY";
pub const VISION_MODEL: &str = "VISION_MODEL";
pub const VIDEO_API_KEY: &str = "VIDEO_API_KEY";
pub const VIDEO_MODEL: &str = "VIDEO_MODEL";

pub trait SettingsSource: Send + Sync {
    /// Raw value for `key`, if set
    fn get(&self, key: &str) -> Option<String>;

    /// A credential that must be present. Blank counts as absent.
    fn credential(&self, key: &str) -> Result<String, AppError> {
        self.get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Auth(format!("{} is not set", key)))
    }

    /// Model name for `key`, falling back to `default`.
    fn model_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Settings read from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// In-memory settings with an optional fallback source.
#[derive(Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
    fallback: Option<Box<dyn SettingsSource>>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Consult `fallback` for keys not set here.
    pub fn over(mut self, fallback: impl SettingsSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Parse `key=value` pairs, as given on a command line.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut settings = Self::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AppError::Config(format!("Expected key=value, got '{}'", pair))
            })?;
            settings = settings.with(key.trim(), value.trim());
        }
        Ok(settings)
    }
}

impl SettingsSource for MapSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|f| f.get(key)))
    }
}

impl std::fmt::Debug for MapSettings {
    // Values are credentials; only list the keys.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSettings")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
