//! Generation modes and the per-mode request shapes sent to providers.
//!
//! Inputs on a slot are loose (a prompt, some images, optional settings);
//! [`GenerationRequest::from_inputs`] is the single place they are checked and
//! turned into a request whose variant only carries the fields that mode
//! accepts.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::asset::EncodedImage;
use super::slot::SlotInputs;
use crate::error::AppError;

/// Maximum reference images for multi and combine
pub const MAX_REFERENCE_IMAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Edit,
    Generate,
    Multi,
    Combine,
    Video,
    Analyze,
}

impl GenerationMode {
    /// (min, max) reference images accepted by the mode
    pub fn image_bounds(&self) -> (usize, usize) {
        match self {
            GenerationMode::Edit => (1, 1),
            GenerationMode::Generate => (0, 0),
            GenerationMode::Multi => (1, MAX_REFERENCE_IMAGES),
            GenerationMode::Combine => (2, MAX_REFERENCE_IMAGES),
            GenerationMode::Video => (0, 1),
            GenerationMode::Analyze => (1, 1),
        }
    }

    /// Async modes return a task id and are completed by polling.
    pub fn is_async(&self) -> bool {
        matches!(self, GenerationMode::Video)
    }

    /// Analyze results are text answers, not generations, and stay out of history.
    pub fn writes_history(&self) -> bool {
        !matches!(self, GenerationMode::Analyze)
    }
}

impl Display for GenerationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GenerationMode::Edit => write!(f, "edit"),
            GenerationMode::Generate => write!(f, "generate"),
            GenerationMode::Multi => write!(f, "multi"),
            GenerationMode::Combine => write!(f, "combine"),
            GenerationMode::Video => write!(f, "video"),
            GenerationMode::Analyze => write!(f, "analyze"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "edit" => Ok(GenerationMode::Edit),
            "generate" => Ok(GenerationMode::Generate),
            "multi" => Ok(GenerationMode::Multi),
            "combine" => Ok(GenerationMode::Combine),
            "video" => Ok(GenerationMode::Video),
            "analyze" => Ok(GenerationMode::Analyze),
            _ => Err(anyhow::anyhow!("Invalid generation mode: {}", s)),
        }
    }
}

/// Output shaping for image modes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    #[default]
    Fast,
    Standard,
}

/// Request shaping for video models.
///
/// Audio-capable models never take an end frame and keyframe models never
/// take an audio flag; the variant decides which fields exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum VideoProfile {
    Audio {
        aspect_ratio: String,
        duration_secs: u32,
        resolution: String,
        generate_audio: bool,
    },
    Keyframe {
        aspect_ratio: String,
        duration_secs: u32,
        resolution: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_frame: Option<EncodedImage>,
        quality: VideoQuality,
    },
}

impl Default for VideoProfile {
    fn default() -> Self {
        VideoProfile::Audio {
            aspect_ratio: "16:9".to_string(),
            duration_secs: 8,
            resolution: "720p".to_string(),
            generate_audio: false,
        }
    }
}

impl VideoProfile {
    pub fn end_frame(&self) -> Option<&EncodedImage> {
        match self {
            VideoProfile::Keyframe { end_frame, .. } => end_frame.as_ref(),
            VideoProfile::Audio { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerationRequest {
    Edit {
        prompt: String,
        image: EncodedImage,
        config: ImageConfig,
    },
    Generate {
        prompt: String,
        config: ImageConfig,
    },
    Multi {
        prompt: String,
        images: Vec<EncodedImage>,
        config: ImageConfig,
    },
    Combine {
        prompt: String,
        images: Vec<EncodedImage>,
        config: ImageConfig,
    },
    Analyze {
        prompt: String,
        image: EncodedImage,
    },
    Video {
        prompt: String,
        start_frame: Option<EncodedImage>,
        profile: VideoProfile,
    },
}

impl GenerationRequest {
    /// Validate slot inputs and shape them into a request.
    ///
    /// Runs entirely locally; a failure here never reaches the network.
    pub fn from_inputs(inputs: &SlotInputs) -> Result<Self, AppError> {
        let prompt = inputs.prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation("Prompt is required".to_string()));
        }
        let prompt = prompt.to_string();

        let mode = inputs.mode;
        let count = inputs.images.len();
        let (min, max) = mode.image_bounds();
        if count < min || count > max {
            return Err(AppError::Validation(image_count_message(mode, min, max, count)));
        }

        let mut images = inputs.images.iter().cloned();
        let config = inputs.image_config.clone();
        let request = match mode {
            GenerationMode::Edit => GenerationRequest::Edit {
                prompt,
                image: images.next().ok_or_else(missing_image)?,
                config,
            },
            GenerationMode::Generate => GenerationRequest::Generate { prompt, config },
            GenerationMode::Multi => GenerationRequest::Multi {
                prompt,
                images: images.collect(),
                config,
            },
            GenerationMode::Combine => GenerationRequest::Combine {
                prompt,
                images: images.collect(),
                config,
            },
            GenerationMode::Analyze => GenerationRequest::Analyze {
                prompt,
                image: images.next().ok_or_else(missing_image)?,
            },
            GenerationMode::Video => GenerationRequest::Video {
                prompt,
                start_frame: images.next(),
                profile: inputs.video_profile.clone().unwrap_or_default(),
            },
        };

        Ok(request)
    }

    pub fn mode(&self) -> GenerationMode {
        match self {
            GenerationRequest::Edit { .. } => GenerationMode::Edit,
            GenerationRequest::Generate { .. } => GenerationMode::Generate,
            GenerationRequest::Multi { .. } => GenerationMode::Multi,
            GenerationRequest::Combine { .. } => GenerationMode::Combine,
            GenerationRequest::Analyze { .. } => GenerationMode::Analyze,
            GenerationRequest::Video { .. } => GenerationMode::Video,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            GenerationRequest::Edit { prompt, .. }
            | GenerationRequest::Generate { prompt, .. }
            | GenerationRequest::Multi { prompt, .. }
            | GenerationRequest::Combine { prompt, .. }
            | GenerationRequest::Analyze { prompt, .. }
            | GenerationRequest::Video { prompt, .. } => prompt,
        }
    }

    /// Images the request was built from, in order, for history entries.
    pub fn source_images(&self) -> Vec<EncodedImage> {
        match self {
            GenerationRequest::Edit { image, .. } | GenerationRequest::Analyze { image, .. } => {
                vec![image.clone()]
            }
            GenerationRequest::Generate { .. } => Vec::new(),
            GenerationRequest::Multi { images, .. } | GenerationRequest::Combine { images, .. } => {
                images.clone()
            }
            GenerationRequest::Video {
                start_frame,
                profile,
                ..
            } => start_frame
                .iter()
                .chain(profile.end_frame())
                .cloned()
                .collect(),
        }
    }

    /// Mutable access to the frames of a video request, so they can be
    /// recompressed before submission. Empty for every other mode.
    pub fn video_frames_mut(&mut self) -> Vec<&mut EncodedImage> {
        match self {
            GenerationRequest::Video {
                start_frame,
                profile,
                ..
            } => {
                let end_frame = match profile {
                    VideoProfile::Keyframe { end_frame, .. } => end_frame.as_mut(),
                    VideoProfile::Audio { .. } => None,
                };
                start_frame.as_mut().into_iter().chain(end_frame).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn missing_image() -> AppError {
    AppError::Validation("An image is required".to_string())
}

fn image_count_message(mode: GenerationMode, min: usize, max: usize, count: usize) -> String {
    if min == max {
        let noun = if min == 1 { "image" } else { "images" };
        if min == 0 {
            return format!("{} mode does not accept reference images", mode);
        }
        return format!(
            "{} mode requires exactly {} {} (got {})",
            mode, min, noun, count
        );
    }
    if count < min {
        format!(
            "{} mode requires at least {} image(s) (got {})",
            mode, min, count
        )
    } else {
        format!(
            "{} mode accepts at most {} image(s) (got {})",
            mode, max, count
        )
    }
}
