//! Slot state store
//!
//! Ordered list of slots behind one async lock. Every mutation goes through
//! here so status transitions are checked in one place. Writes coming from a
//! submit or poll chain use [`SlotStore::update_if_job`], which silently drops
//! the write when the slot has since been cleared, removed or re-run.

use genslot_core::models::{EncodedImage, JobId, Slot, SlotId, SlotInputs, SlotPatch, SlotStatus};
use genslot_core::AppError;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::poll::PollScheduler;

/// Result of distributing a batch of images over the slot list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkFillReport {
    /// Existing empty slots that received an image
    pub filled: Vec<SlotId>,
    /// Slots created to hold the remaining images
    pub created: Vec<SlotId>,
    /// Images that did not fit under the slot limit
    pub dropped: usize,
}

pub struct SlotStore {
    slots: RwLock<Vec<Slot>>,
    max_slots: usize,
    min_slots: usize,
    scheduler: Arc<PollScheduler>,
}

impl SlotStore {
    /// Store holding `min_slots` idle slots.
    pub fn new(min_slots: usize, max_slots: usize, scheduler: Arc<PollScheduler>) -> Self {
        let slots = (0..min_slots).map(|_| Slot::new()).collect();
        Self {
            slots: RwLock::new(slots),
            max_slots,
            min_slots,
            scheduler,
        }
    }

    pub fn from_config(config: &genslot_core::Config, scheduler: Arc<PollScheduler>) -> Self {
        Self::new(config.min_slots(), config.max_slots(), scheduler)
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn min_slots(&self) -> usize {
        self.min_slots
    }

    /// Snapshot of every slot, in display order.
    pub async fn slots(&self) -> Vec<Slot> {
        self.slots.read().await.clone()
    }

    pub async fn get(&self, id: SlotId) -> Option<Slot> {
        self.slots.read().await.iter().find(|s| s.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn create_slot(&self) -> Result<Slot, AppError> {
        self.create_slot_with(SlotInputs::default()).await
    }

    pub async fn create_slot_with(&self, inputs: SlotInputs) -> Result<Slot, AppError> {
        let mut slots = self.slots.write().await;
        if slots.len() >= self.max_slots {
            return Err(AppError::Capacity {
                max: self.max_slots,
            });
        }
        let slot = Slot::with_inputs(inputs);
        slots.push(slot.clone());
        tracing::debug!(slot_id = %slot.id, count = slots.len(), "Slot created");
        Ok(slot)
    }

    /// Merge user edits into a slot. Status moves must be legal transitions,
    /// and the error message is cleared whenever the resulting status is not
    /// `Failed`.
    ///
    /// Runs own their bookkeeping: `job_id`, `task_id` and `results` cannot
    /// be patched here, a run is only started by `begin_run`, and an
    /// in-flight slot keeps its status until the run settles or
    /// [`SlotStore::clear_slot`] cancels it.
    pub async fn update_slot(&self, id: SlotId, patch: SlotPatch) -> Result<Slot, AppError> {
        if patch.job_id.is_some() || patch.task_id.is_some() || patch.results.is_some() {
            return Err(AppError::Validation(
                "job_id, task_id and results are owned by the running job".to_string(),
            ));
        }

        let mut slots = self.slots.write().await;
        let slot = find_mut(&mut slots, id)?;
        if let Some(next) = patch.status {
            if slot.is_in_flight() && next != slot.status {
                return Err(AppError::SlotBusy(id.to_string()));
            }
            if !slot.status.can_transition_to(next) {
                return Err(AppError::InvalidTransition {
                    from: slot.status,
                    to: next,
                });
            }
            if next.is_in_flight() && !slot.is_in_flight() {
                return Err(AppError::Validation(format!(
                    "slot {} can only enter {} by being run",
                    id, next
                )));
            }
        }
        apply_checked(slot, patch)?;
        Ok(slot.clone())
    }

    /// Atomically claim an idle or finished slot for a new run. Fails with
    /// `SlotBusy` if a run already owns it.
    pub async fn begin_run(&self, id: SlotId, job_id: JobId) -> Result<Slot, AppError> {
        let mut slots = self.slots.write().await;
        let slot = find_mut(&mut slots, id)?;
        if slot.is_in_flight() {
            return Err(AppError::SlotBusy(id.to_string()));
        }
        let patch = SlotPatch::new()
            .status(SlotStatus::Submitting)
            .job_id(Some(job_id))
            .task_id(None)
            .results(Vec::new())
            .error(None)
            .notice(None);
        apply_checked(slot, patch)?;
        Ok(slot.clone())
    }

    /// Apply `patch` only if `job_id` still owns the slot. Returns `None`
    /// when the slot is gone or now belongs to another run.
    pub async fn update_if_job(
        &self,
        id: SlotId,
        job_id: JobId,
        patch: SlotPatch,
    ) -> Result<Option<Slot>, AppError> {
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.iter_mut().find(|s| s.id == id) else {
            tracing::debug!(slot_id = %id, job_id = %job_id, "Dropping update for removed slot");
            return Ok(None);
        };
        if slot.job_id != Some(job_id) {
            tracing::debug!(slot_id = %id, job_id = %job_id, "Dropping stale job update");
            return Ok(None);
        }
        apply_checked(slot, patch)?;
        Ok(Some(slot.clone()))
    }

    pub async fn is_current_job(&self, id: SlotId, job_id: JobId) -> bool {
        self.slots
            .read()
            .await
            .iter()
            .any(|s| s.id == id && s.job_id == Some(job_id))
    }

    /// Remove a slot, cancelling its poll job first. Refused when the store
    /// is already at its minimum size.
    pub async fn remove_slot(&self, id: SlotId) -> Result<(), AppError> {
        loop {
            let job_id = {
                let slots = self.slots.read().await;
                let slot = slots
                    .iter()
                    .find(|s| s.id == id)
                    .ok_or_else(|| AppError::NotFound(format!("slot {}", id)))?;
                if slots.len() <= self.min_slots {
                    return Err(AppError::MinimumSlots {
                        min: self.min_slots,
                    });
                }
                slot.job_id
            };

            // Cancel outside the lock: observers of this job take it
            if let Some(job_id) = job_id {
                self.scheduler.cancel(job_id).await;
            }

            let mut slots = self.slots.write().await;
            let Some(index) = slots.iter().position(|s| s.id == id) else {
                return Err(AppError::NotFound(format!("slot {}", id)));
            };
            if slots[index].job_id != job_id {
                // A new run claimed the slot in between; cancel that one too
                continue;
            }
            if slots.len() <= self.min_slots {
                return Err(AppError::MinimumSlots {
                    min: self.min_slots,
                });
            }
            slots.remove(index);
            tracing::info!(slot_id = %id, count = slots.len(), "Slot removed");
            return Ok(());
        }
    }

    /// Cancel any poll job and return the slot to idle with no results.
    /// With `reset_inputs` the prompt and images are cleared as well.
    pub async fn clear_slot(&self, id: SlotId, reset_inputs: bool) -> Result<Slot, AppError> {
        loop {
            let job_id = self
                .get(id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("slot {}", id)))?
                .job_id;
            if let Some(job_id) = job_id {
                self.scheduler.cancel(job_id).await;
            }

            let mut slots = self.slots.write().await;
            let slot = find_mut(&mut slots, id)?;
            if slot.job_id != job_id {
                // Re-run in between; cancel the new job before resetting
                continue;
            }
            let mut patch = SlotPatch::new()
                .status(SlotStatus::Idle)
                .task_id(None)
                .job_id(None)
                .results(Vec::new())
                .error(None)
                .notice(None);
            if reset_inputs {
                let mode = slot.inputs.mode;
                patch = patch.inputs(SlotInputs {
                    mode,
                    ..SlotInputs::default()
                });
            }
            apply_checked(slot, patch)?;
            tracing::debug!(slot_id = %id, reset_inputs, "Slot cleared");
            return Ok(slot.clone());
        }
    }

    /// Put one image into each empty, idle slot from left to right, then
    /// create new slots up to the limit. Images beyond that are dropped.
    pub async fn bulk_fill(&self, images: Vec<EncodedImage>) -> BulkFillReport {
        let mut report = BulkFillReport::default();
        let mut slots = self.slots.write().await;
        let mut images = images.into_iter();

        for slot in slots.iter_mut().filter(|s| s.is_empty() && !s.is_in_flight()) {
            let Some(image) = images.next() else {
                break;
            };
            SlotPatch::new().images(vec![image]).apply(slot);
            report.filled.push(slot.id);
        }

        for image in images {
            if slots.len() >= self.max_slots {
                report.dropped += 1;
                continue;
            }
            let slot = Slot::with_inputs(SlotInputs::default().with_images(vec![image]));
            report.created.push(slot.id);
            slots.push(slot);
        }

        if report.dropped > 0 {
            tracing::warn!(
                dropped = report.dropped,
                max_slots = self.max_slots,
                "Slot limit reached, extra images dropped"
            );
        }
        report
    }
}

fn find_mut(slots: &mut [Slot], id: SlotId) -> Result<&mut Slot, AppError> {
    slots
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("slot {}", id)))
}

fn apply_checked(slot: &mut Slot, mut patch: SlotPatch) -> Result<(), AppError> {
    if let Some(next) = patch.status {
        if !slot.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: slot.status,
                to: next,
            });
        }
    }
    let next = patch.status.unwrap_or(slot.status);
    if next != SlotStatus::Failed {
        patch.error = Some(None);
    }
    patch.apply(slot);
    Ok(())
}
