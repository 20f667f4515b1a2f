//! genslot providers
//!
//! HTTP clients for the three remote collaborators: image generation/editing,
//! vision analysis and video generation. Each client turns a
//! [`GenerationRequest`](genslot_core::models::GenerationRequest) into one HTTP
//! call and normalizes the answer into [`Submission`] or
//! [`TaskStatusReport`](genslot_core::models::TaskStatusReport).
//!
//! Status code mapping shared by all clients:
//!
//! | HTTP | Error |
//! |------|-------|
//! | 401, 403 | `Auth` |
//! | 402, 429 | `Quota` |
//! | 400, 422 | `Validation` |
//! | other non-2xx | `Provider` |
//! | no response | `Transport` |

pub(crate) mod http;
pub mod image;
pub mod provider;
pub mod video;
pub mod vision;

pub use image::ImageClient;
pub use provider::{GenerationProvider, ProviderSet, Submission, UnconfiguredProvider};
pub use video::VideoClient;
pub use vision::VisionClient;

use genslot_core::{AppError, Config, SettingsSource};
use std::sync::Arc;

/// Build the provider set from configuration. Providers without a configured
/// URL are replaced by [`UnconfiguredProvider`], which fails on use.
pub fn create_providers(
    config: &Config,
    settings: Arc<dyn SettingsSource>,
) -> Result<ProviderSet, AppError> {
    let timeout = config.http_timeout();

    let image: Arc<dyn GenerationProvider> = match config.image_api_url() {
        Some(url) => Arc::new(ImageClient::new(url, settings.clone(), timeout)?),
        None => Arc::new(UnconfiguredProvider::new("image", "GENSLOT_IMAGE_API_URL")),
    };
    let vision: Arc<dyn GenerationProvider> = match config.vision_api_url() {
        Some(url) => Arc::new(VisionClient::new(url, settings.clone(), timeout)?),
        None => Arc::new(UnconfiguredProvider::new("vision", "GENSLOT_VISION_API_URL")),
    };
    let video: Arc<dyn GenerationProvider> = match config.video_api_url() {
        Some(url) => Arc::new(VideoClient::new(url, settings, timeout)?),
        None => Arc::new(UnconfiguredProvider::new("video", "GENSLOT_VIDEO_API_URL")),
    };

    Ok(ProviderSet::new(image, vision, video))
}
