use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::{Asset, EncodedImage};
use super::generation::GenerationMode;

/// A completed generation. Written once on success, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mode: GenerationMode,
    pub prompt: String,
    pub source_images: Vec<EncodedImage>,
    pub results: Vec<Asset>,
}

impl HistoryEntry {
    pub fn new(
        mode: GenerationMode,
        prompt: impl Into<String>,
        source_images: Vec<EncodedImage>,
        results: Vec<Asset>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mode,
            prompt: prompt.into(),
            source_images,
            results,
        }
    }
}

/// An uploaded or generated asset the user kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionItem {
    pub id: Uuid,
    pub preview: Asset,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CollectionItem {
    pub fn new(preview: Asset, file_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            preview,
            file_name,
            created_at: Utc::now(),
        }
    }

    /// Collection item for a freshly uploaded image, named after its file.
    pub fn from_upload(image: EncodedImage) -> Self {
        let file_name = image.file_name.clone();
        Self::new(Asset::Image(image), file_name)
    }
}
