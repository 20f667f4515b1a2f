use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::asset::{Asset, EncodedImage};
use super::generation::{GenerationMode, GenerationRequest, ImageConfig, VideoProfile};
use super::ids::{JobId, SlotId};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
}

impl SlotStatus {
    /// A slot in one of these states owns a running submit or poll chain.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SlotStatus::Submitting | SlotStatus::Polling)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Succeeded | SlotStatus::Failed)
    }

    /// Legal status moves. Staying in the same status is not a transition
    /// and always allowed. Any status may be cleared back to idle.
    pub fn can_transition_to(&self, next: SlotStatus) -> bool {
        use SlotStatus::*;

        if *self == next || next == Idle {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Succeeded, Submitting)
                | (Failed, Submitting)
                | (Submitting, Polling)
                | (Submitting, Succeeded)
                | (Submitting, Failed)
                | (Polling, Succeeded)
                | (Polling, Failed)
        )
    }
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SlotStatus::Idle => write!(f, "idle"),
            SlotStatus::Submitting => write!(f, "submitting"),
            SlotStatus::Polling => write!(f, "polling"),
            SlotStatus::Succeeded => write!(f, "succeeded"),
            SlotStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SlotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SlotStatus::Idle),
            "submitting" => Ok(SlotStatus::Submitting),
            "polling" => Ok(SlotStatus::Polling),
            "succeeded" => Ok(SlotStatus::Succeeded),
            "failed" => Ok(SlotStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid slot status: {}", s)),
        }
    }
}

/// What the user put into a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotInputs {
    pub prompt: String,
    pub images: Vec<EncodedImage>,
    pub mode: GenerationMode,
    #[serde(default)]
    pub image_config: ImageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_profile: Option<VideoProfile>,
    /// Save produced images to the collection on success
    #[serde(default)]
    pub save_to_collection: bool,
}

impl Default for SlotInputs {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            images: Vec::new(),
            mode: GenerationMode::Edit,
            image_config: ImageConfig::default(),
            video_profile: None,
            save_to_collection: false,
        }
    }
}

impl SlotInputs {
    pub fn new(mode: GenerationMode, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: Vec<EncodedImage>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub inputs: SlotInputs,
    pub status: SlotStatus,
    /// Remote task id, set once an async provider accepted the job
    pub task_id: Option<String>,
    /// Poll job currently (or last) driving this slot
    pub job_id: Option<JobId>,
    pub results: Vec<Asset>,
    /// Set only while `status == Failed`
    pub error: Option<String>,
    /// Advisory message from a transient poll miss
    pub notice: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn new() -> Self {
        Self::with_inputs(SlotInputs::default())
    }

    pub fn with_inputs(inputs: SlotInputs) -> Self {
        Self {
            id: SlotId::new(),
            inputs,
            status: SlotStatus::Idle,
            task_id: None,
            job_id: None,
            results: Vec::new(),
            error: None,
            notice: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }

    /// No reference image yet, so a bulk transfer may fill it.
    pub fn is_empty(&self) -> bool {
        self.inputs.images.is_empty()
    }

    pub fn has_required_inputs(&self) -> bool {
        GenerationRequest::from_inputs(&self.inputs).is_ok()
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update merged into one slot.
///
/// `None` leaves a field untouched. Fields that are themselves optional on the
/// slot take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct SlotPatch {
    pub prompt: Option<String>,
    pub images: Option<Vec<EncodedImage>>,
    pub inputs: Option<SlotInputs>,
    pub status: Option<SlotStatus>,
    pub task_id: Option<Option<String>>,
    pub job_id: Option<Option<JobId>>,
    pub results: Option<Vec<Asset>>,
    pub error: Option<Option<String>>,
    pub notice: Option<Option<String>>,
}

impl SlotPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: SlotStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn images(mut self, images: Vec<EncodedImage>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn inputs(mut self, inputs: SlotInputs) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn task_id(mut self, task_id: Option<String>) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn job_id(mut self, job_id: Option<JobId>) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn results(mut self, results: Vec<Asset>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn notice(mut self, notice: Option<String>) -> Self {
        self.notice = Some(notice);
        self
    }

    /// Merge into `slot`. Status legality is checked by the store, not here.
    pub fn apply(self, slot: &mut Slot) {
        if let Some(inputs) = self.inputs {
            slot.inputs = inputs;
        }
        if let Some(prompt) = self.prompt {
            slot.inputs.prompt = prompt;
        }
        if let Some(images) = self.images {
            slot.inputs.images = images;
        }
        if let Some(status) = self.status {
            slot.status = status;
        }
        if let Some(task_id) = self.task_id {
            slot.task_id = task_id;
        }
        if let Some(job_id) = self.job_id {
            slot.job_id = job_id;
        }
        if let Some(results) = self.results {
            slot.results = results;
        }
        if let Some(error) = self.error {
            slot.error = error;
        }
        if let Some(notice) = self.notice {
            slot.notice = notice;
        }
        slot.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_paths() {
        use SlotStatus::*;

        // idle -> submitting -> {succeeded | failed}
        assert!(Idle.can_transition_to(Submitting));
        assert!(Submitting.can_transition_to(Succeeded));
        assert!(Submitting.can_transition_to(Failed));
        // idle -> submitting -> polling -> {succeeded | failed}
        assert!(Submitting.can_transition_to(Polling));
        assert!(Polling.can_transition_to(Succeeded));
        assert!(Polling.can_transition_to(Failed));
    }

    #[test]
    fn test_illegal_paths() {
        use SlotStatus::*;

        assert!(!Idle.can_transition_to(Polling));
        assert!(!Idle.can_transition_to(Succeeded));
        assert!(!Idle.can_transition_to(Failed));
        assert!(!Polling.can_transition_to(Submitting));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Polling));
    }

    #[test]
    fn test_rerun_and_clear() {
        use SlotStatus::*;

        assert!(Succeeded.can_transition_to(Submitting));
        assert!(Failed.can_transition_to(Submitting));
        assert!(Polling.can_transition_to(Idle));
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let mut slot = Slot::with_inputs(SlotInputs::new(GenerationMode::Generate, "a fox"));
        slot.error = Some("old".to_string());

        SlotPatch::new()
            .status(SlotStatus::Submitting)
            .error(None)
            .apply(&mut slot);

        assert_eq!(slot.status, SlotStatus::Submitting);
        assert_eq!(slot.error, None);
        assert_eq!(slot.inputs.prompt, "a fox");
        assert!(slot.task_id.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("polling".parse::<SlotStatus>().unwrap(), SlotStatus::Polling);
        assert!("cancelled".parse::<SlotStatus>().is_err());
        assert_eq!(SlotStatus::Succeeded.to_string(), "succeeded");
    }
}
