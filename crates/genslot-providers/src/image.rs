//! Image generation / editing provider
//!
//! Synchronous: one round trip returns the finished images, either inline as
//! base64 or as URLs.

use async_trait::async_trait;
use genslot_core::models::{Asset, EncodedImage, GenerationRequest, ImageConfig};
use genslot_core::settings::{IMAGE_API_KEY, IMAGE_MODEL};
use genslot_core::{AppError, SettingsSource};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::http::{build_client, error_from_response, join_url, transport_error, WireImage};
use crate::provider::{GenerationProvider, Submission};

pub const DEFAULT_IMAGE_MODEL: &str = "image-edit-v1";

#[derive(Debug, Serialize)]
struct ImageRequestBody<'a> {
    model: String,
    mode: &'static str,
    prompt: &'a str,
    images: Vec<WireImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ImageResponseBody {
    #[serde(default)]
    images: Vec<WireImage>,
    #[serde(default)]
    urls: Vec<String>,
}

pub struct ImageClient {
    http_client: reqwest::Client,
    base_url: String,
    settings: Arc<dyn SettingsSource>,
}

impl Debug for ImageClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImageClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ImageClient {
    pub fn new(
        base_url: impl Into<String>,
        settings: Arc<dyn SettingsSource>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http_client: build_client(timeout)?,
            base_url: base_url.into(),
            settings,
        })
    }

    fn body<'a>(
        &self,
        mode: &'static str,
        prompt: &'a str,
        images: Vec<&EncodedImage>,
        config: &'a ImageConfig,
    ) -> ImageRequestBody<'a> {
        ImageRequestBody {
            model: self.settings.model_or(IMAGE_MODEL, DEFAULT_IMAGE_MODEL),
            mode,
            prompt,
            images: images.into_iter().map(WireImage::from).collect(),
            aspect_ratio: config.aspect_ratio.as_deref(),
            resolution: config.resolution.as_deref(),
        }
    }
}

#[async_trait]
impl GenerationProvider for ImageClient {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, AppError> {
        let body = match request {
            GenerationRequest::Edit {
                prompt,
                image,
                config,
            } => self.body("edit", prompt, vec![image], config),
            GenerationRequest::Generate { prompt, config } => {
                self.body("generate", prompt, Vec::new(), config)
            }
            GenerationRequest::Multi {
                prompt,
                images,
                config,
            } => self.body("multi", prompt, images.iter().collect(), config),
            GenerationRequest::Combine {
                prompt,
                images,
                config,
            } => self.body("combine", prompt, images.iter().collect(), config),
            other => {
                return Err(AppError::Validation(format!(
                    "Image provider does not handle {} requests",
                    other.mode()
                )))
            }
        };

        let api_key = self.settings.credential(IMAGE_API_KEY)?;

        tracing::info!(
            provider = "image",
            mode = body.mode,
            model = %body.model,
            images = body.images.len(),
            "Submitting image request"
        );

        let response = self
            .http_client
            .post(join_url(&self.base_url, "/v1/images"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("image", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("image", response).await);
        }

        let parsed: ImageResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed image response: {}", e)))?;

        let assets: Vec<Asset> = parsed
            .images
            .into_iter()
            .map(|image| Asset::Image(EncodedImage::new(image.mime_type, image.data)))
            .chain(parsed.urls.into_iter().map(|url| Asset::ImageUrl { url }))
            .collect();

        if assets.is_empty() {
            return Err(AppError::Provider(
                "Provider returned no images".to_string(),
            ));
        }

        tracing::info!(provider = "image", results = assets.len(), "Image request completed");
        Ok(Submission::Completed(assets))
    }
}
