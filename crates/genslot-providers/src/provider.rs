//! Provider trait and the routing set handed to the orchestrator.

use async_trait::async_trait;
use genslot_core::models::{Asset, GenerationMode, GenerationRequest, TaskStatusReport};
use genslot_core::AppError;
use std::fmt::Debug;
use std::sync::Arc;

/// Outcome of a successful submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Synchronous provider: the finished assets
    Completed(Vec<Asset>),
    /// Asynchronous provider: the job was accepted and must be polled
    Accepted { task_id: String },
}

/// A remote generation provider.
///
/// Implementations never retry. Every failure is returned once, classified,
/// and the caller decides what to do with it.
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Start a generation
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, AppError>;

    /// Check a task previously accepted by `submit`
    async fn poll_status(&self, task_id: &str) -> Result<TaskStatusReport, AppError> {
        let _ = task_id;
        Err(AppError::Internal(format!(
            "{} does not support status polling",
            self.name()
        )))
    }
}

/// Stand-in for a provider whose endpoint is not configured.
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    name: &'static str,
    url_key: &'static str,
}

impl UnconfiguredProvider {
    pub fn new(name: &'static str, url_key: &'static str) -> Self {
        Self { name, url_key }
    }
}

#[async_trait]
impl GenerationProvider for UnconfiguredProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn submit(&self, _request: &GenerationRequest) -> Result<Submission, AppError> {
        Err(AppError::Config(format!(
            "{} provider is not configured: set {}",
            self.name, self.url_key
        )))
    }

    async fn poll_status(&self, _task_id: &str) -> Result<TaskStatusReport, AppError> {
        Err(AppError::Config(format!(
            "{} provider is not configured: set {}",
            self.name, self.url_key
        )))
    }
}

/// The three providers, routed by generation mode.
#[derive(Debug, Clone)]
pub struct ProviderSet {
    image: Arc<dyn GenerationProvider>,
    vision: Arc<dyn GenerationProvider>,
    video: Arc<dyn GenerationProvider>,
}

impl ProviderSet {
    pub fn new(
        image: Arc<dyn GenerationProvider>,
        vision: Arc<dyn GenerationProvider>,
        video: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            image,
            vision,
            video,
        }
    }

    /// One provider serving every mode
    pub fn single(provider: Arc<dyn GenerationProvider>) -> Self {
        Self::new(provider.clone(), provider.clone(), provider)
    }

    pub fn for_mode(&self, mode: GenerationMode) -> Arc<dyn GenerationProvider> {
        match mode {
            GenerationMode::Edit
            | GenerationMode::Generate
            | GenerationMode::Multi
            | GenerationMode::Combine => self.image.clone(),
            GenerationMode::Analyze => self.vision.clone(),
            GenerationMode::Video => self.video.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_provider_reports_config_error() {
        let provider = UnconfiguredProvider::new("video", "GENSLOT_VIDEO_API_URL");
        let err = provider.poll_status("abc").await.unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("GENSLOT_VIDEO_API_URL")));
    }

    #[test]
    fn test_routing_by_mode() {
        let set = ProviderSet::new(
            Arc::new(UnconfiguredProvider::new("image", "A")),
            Arc::new(UnconfiguredProvider::new("vision", "B")),
            Arc::new(UnconfiguredProvider::new("video", "C")),
        );
        assert_eq!(set.for_mode(GenerationMode::Combine).name(), "image");
        assert_eq!(set.for_mode(GenerationMode::Analyze).name(), "vision");
        assert_eq!(set.for_mode(GenerationMode::Video).name(), "video");
    }
}
