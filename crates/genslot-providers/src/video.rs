//! Video generation provider
//!
//! Asynchronous: submit returns a task id, completion is observed through the
//! status endpoint. Request shaping follows the [`VideoProfile`] variant, so a
//! keyframe model never receives an audio flag and vice versa.

use async_trait::async_trait;
use genslot_core::models::{
    Asset, GenerationRequest, RemoteStatus, TaskStatusReport, VideoProfile, VideoQuality,
};
use genslot_core::settings::{VIDEO_API_KEY, VIDEO_MODEL};
use genslot_core::{AppError, SettingsSource};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::http::{build_client, error_from_response, join_url, transport_error, WireImage};
use crate::provider::{GenerationProvider, Submission};

pub const DEFAULT_VIDEO_MODEL: &str = "video-v1";

#[derive(Debug, Serialize)]
struct VideoRequestBody<'a> {
    model: String,
    prompt: &'a str,
    aspect_ratio: &'a str,
    duration_secs: u32,
    resolution: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_frame: Option<WireImage>,
    #[serde(flatten)]
    profile: ProfileFields,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ProfileFields {
    Audio {
        generate_audio: bool,
    },
    Keyframe {
        #[serde(skip_serializing_if = "Option::is_none")]
        end_frame: Option<WireImage>,
        quality: VideoQuality,
    },
}

#[derive(Debug, Deserialize)]
struct SubmitResponseBody {
    #[serde(alias = "id")]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponseBody {
    status: String,
    #[serde(default, alias = "url")]
    video_url: Option<String>,
    #[serde(default, alias = "error_message")]
    error: Option<String>,
}

pub struct VideoClient {
    http_client: reqwest::Client,
    base_url: String,
    settings: Arc<dyn SettingsSource>,
}

impl Debug for VideoClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl VideoClient {
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

fn to_report(body: StatusResponseBody) -> Result<TaskStatusReport, AppError> {
    let status: RemoteStatus = body
        .status
        .parse()
        .map_err(|_| AppError::Provider(format!("Unknown task status '{}'", body.status)))?;

    let report = match status {
        RemoteStatus::Pending => TaskStatusReport::pending(),
        RemoteStatus::Processing => TaskStatusReport::processing(),
        RemoteStatus::Completed => match body.video_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => TaskStatusReport::completed(Asset::Video { url }),
            None => TaskStatusReport::failed("Provider reported completion without a video URL"),
        },
        RemoteStatus::Failed => TaskStatusReport::failed(
            body.error
                .unwrap_or_else(|| "Video generation failed".to_string()),
        ),
    };
    Ok(report)
}

#[async_trait]
impl GenerationProvider for VideoClient {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, AppError> {
        let GenerationRequest::Video {
            prompt,
            start_frame,
            profile,
        } = request
        else {
            return Err(AppError::Validation(format!(
                "Video provider does not handle {} requests",
                request.mode()
            )));
        };

        let api_key = self.settings.credential(VIDEO_API_KEY)?;

        let (aspect_ratio, duration_secs, resolution, fields) = match profile {
            VideoProfile::Audio {
                aspect_ratio,
                duration_secs,
                resolution,
                generate_audio,
            } => (
                aspect_ratio,
                *duration_secs,
                resolution,
                ProfileFields::Audio {
                    generate_audio: *generate_audio,
                },
            ),
            VideoProfile::Keyframe {
                aspect_ratio,
                duration_secs,
                resolution,
                end_frame,
                quality,
            } => (
                aspect_ratio,
                *duration_secs,
                resolution,
                ProfileFields::Keyframe {
                    end_frame: end_frame.as_ref().map(WireImage::from),
                    quality: *quality,
                },
            ),
        };

        let body = VideoRequestBody {
            model: self.settings.model_or(VIDEO_MODEL, DEFAULT_VIDEO_MODEL),
            prompt,
            aspect_ratio,
            duration_secs,
            resolution,
            start_frame: start_frame.as_ref().map(WireImage::from),
            profile: fields,
        };

        tracing::info!(
            provider = "video",
            model = %body.model,
            duration_secs = duration_secs,
            has_start_frame = body.start_frame.is_some(),
            "Submitting video request"
        );

        let response = self
            .http_client
            .post(join_url(&self.base_url, "/v1/videos"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("video", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("video", response).await);
        }

        let parsed: SubmitResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed video response: {}", e)))?;

        let task_id = parsed
            .task_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::Provider("Provider response missing task id".to_string()))?;

        tracing::info!(provider = "video", task_id = %task_id, "Video task accepted");
        Ok(Submission::Accepted { task_id })
    }

    async fn poll_status(&self, task_id: &str) -> Result<TaskStatusReport, AppError> {
        let api_key = self.settings.credential(VIDEO_API_KEY)?;

        let response = self
            .http_client
            .get(join_url(&self.base_url, &format!("/v1/videos/{}", task_id)))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| transport_error("video", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("video", response).await);
        }

        let parsed: StatusResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("Unreadable status response: {}", e)))?;

        let report = to_report(parsed)?;
        tracing::debug!(
            provider = "video",
            task_id = %task_id,
            status = %report.status,
            "Video task status"
        );
        Ok(report)
    }
}
