//! Vision / analysis provider: one image and a question in, text out.

use async_trait::async_trait;
use genslot_core::models::{Asset, GenerationRequest};
use genslot_core::settings::{VISION_API_KEY, VISION_MODEL};
use genslot_core::{AppError, SettingsSource};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::http::{build_client, error_from_response, join_url, transport_error, WireImage};
use crate::provider::{GenerationProvider, Submission};

pub const DEFAULT_VISION_MODEL: &str = "vision-v1";

#[derive(Debug, Serialize)]
struct AnalyzeRequestBody<'a> {
    model: String,
    prompt: &'a str,
    image: WireImage,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponseBody {
    text: Option<String>,
}

pub struct VisionClient {
    http_client: reqwest::Client,
    base_url: String,
    settings: Arc<dyn SettingsSource>,
}

impl Debug for VisionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VisionClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl VisionClient {
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
}

#[async_trait]
impl GenerationProvider for VisionClient {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, AppError> {
        let GenerationRequest::Analyze { prompt, image } = request else {
            return Err(AppError::Validation(format!(
                "Vision provider does not handle {} requests",
                request.mode()
            )));
        };

        let api_key = self.settings.credential(VISION_API_KEY)?;
        let body = AnalyzeRequestBody {
            model: self.settings.model_or(VISION_MODEL, DEFAULT_VISION_MODEL),
            prompt,
            image: WireImage::from(image),
        };

        tracing::info!(provider = "vision", model = %body.model, "Submitting analysis request");

        let response = self
            .http_client
            .post(join_url(&self.base_url, "/v1/analyze"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("vision", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("vision", response).await);
        }

        let parsed: AnalyzeResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed analysis response: {}", e)))?;

        let text = parsed
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Provider("Provider returned no analysis text".to_string()))?;

        Ok(Submission::Completed(vec![Asset::Text { text }]))
    }
}
