use async_trait::async_trait;
use futures::future::join_all;
use genslot_core::models::{
    Asset, CollectionItem, EncodedImage, GenerationJob, GenerationMode, GenerationRequest,
    HistoryEntry, JobId, Slot, SlotId, SlotInputs, SlotPatch, SlotStatus,
};
use genslot_core::{AppError, Config, ErrorMetadata, LogLevel};
use genslot_providers::{GenerationProvider, ProviderSet, Submission};
use genslot_storage::{CollectionSink, HistorySink, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::poll::{PollLimits, PollObserver, PollOutcome, PollScheduler, PollUpdate};
use crate::slots::{BulkFillReport, SlotStore};

const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(500);
const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Capped exponential backoff: `base * 2^attempt`, never above `cap`.
pub(crate) fn compute_retry_backoff(attempt: u32, base: Duration, cap: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt)).min(cap)
}

/// Optional sender notified whenever a slot reaches a terminal status.
pub type SlotEventSender = mpsc::Sender<(SlotId, SlotStatus)>;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Extra submit attempts after a transport failure
    pub submit_retries: u32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub video_max_dimension: u32,
    pub video_jpeg_quality: u8,
    pub poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            submit_retries: 2,
            retry_base: RETRY_BACKOFF_BASE,
            retry_cap: RETRY_BACKOFF_CAP,
            video_max_dimension: 1280,
            video_jpeg_quality: 85,
            poll_interval: Duration::from_millis(5000),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            submit_retries: config.submit_retries(),
            video_max_dimension: config.video_max_dimension(),
            video_jpeg_quality: config.video_jpeg_quality(),
            poll_interval: config.poll_interval(),
            ..Self::default()
        }
    }
}

/// What a run needs to remember once its result arrives.
#[derive(Debug, Clone)]
struct RunContext {
    slot_id: SlotId,
    job_id: JobId,
    mode: GenerationMode,
    prompt: String,
    source_images: Vec<EncodedImage>,
    save_to_collection: bool,
}

/// Terminal bookkeeping shared by the submit path and poll observers.
struct Completion {
    store: Arc<SlotStore>,
    history: HistorySink,
    collection: CollectionSink,
    events: Option<SlotEventSender>,
}

impl Completion {
    async fn succeed(
        &self,
        ctx: &RunContext,
        results: Vec<Asset>,
    ) -> Result<Option<Slot>, AppError> {
        let patch = SlotPatch::new()
            .status(SlotStatus::Succeeded)
            .results(results.clone())
            .notice(None);
        let Some(slot) = self.store.update_if_job(ctx.slot_id, ctx.job_id, patch).await? else {
            return Ok(None);
        };

        if ctx.mode.writes_history() {
            let entry = HistoryEntry::new(
                ctx.mode,
                ctx.prompt.clone(),
                ctx.source_images.clone(),
                results.clone(),
            );
            if let Err(e) = self.history.append(&entry).await {
                tracing::error!(
                    slot_id = %ctx.slot_id,
                    error = %e,
                    "Failed to write history entry"
                );
            }
        }

        if ctx.save_to_collection {
            for asset in results.into_iter().filter(Asset::is_image) {
                let item = CollectionItem::new(asset, None);
                if let Err(e) = self.collection.add(&item).await {
                    tracing::error!(
                        slot_id = %ctx.slot_id,
                        error = %e,
                        "Failed to save result to collection"
                    );
                }
            }
        }

        tracing::info!(
            slot_id = %ctx.slot_id,
            job_id = %ctx.job_id,
            mode = %ctx.mode,
            results = slot.results.len(),
            "Slot succeeded"
        );
        self.emit(slot.id, slot.status).await;
        Ok(Some(slot))
    }

    async fn fail(
        &self,
        slot_id: SlotId,
        job_id: JobId,
        error: &AppError,
    ) -> Result<Option<Slot>, AppError> {
        match error.log_level() {
            LogLevel::Debug => tracing::debug!(
                slot_id = %slot_id,
                error_code = error.error_code(),
                error = %error,
                "Slot failed"
            ),
            LogLevel::Warn => tracing::warn!(
                slot_id = %slot_id,
                error_code = error.error_code(),
                error = %error,
                "Slot failed"
            ),
            LogLevel::Error => tracing::error!(
                slot_id = %slot_id,
                error_code = error.error_code(),
                error = %error,
                "Slot failed"
            ),
        }

        let patch = SlotPatch::new()
            .status(SlotStatus::Failed)
            .error(Some(error.client_message()))
            .notice(None);
        let slot = self.store.update_if_job(slot_id, job_id, patch).await?;
        if let Some(slot) = &slot {
            self.emit(slot.id, slot.status).await;
        }
        Ok(slot)
    }

    async fn emit(&self, slot_id: SlotId, status: SlotStatus) {
        if let Some(tx) = &self.events {
            let _ = tx.send((slot_id, status)).await;
        }
    }
}

/// Routes poll callbacks for one run back into the slot store.
struct SlotPollObserver {
    completion: Arc<Completion>,
    ctx: RunContext,
}

#[async_trait]
impl PollObserver for SlotPollObserver {
    async fn on_update(&self, update: PollUpdate) {
        let patch = SlotPatch::new().notice(update.advisory);
        if let Err(e) = self
            .completion
            .store
            .update_if_job(self.ctx.slot_id, self.ctx.job_id, patch)
            .await
        {
            tracing::warn!(slot_id = %self.ctx.slot_id, error = %e, "Failed to record poll update");
        }
    }

    async fn on_terminal(&self, job: GenerationJob, outcome: PollOutcome) {
        let result = match outcome {
            PollOutcome::Completed(Some(asset)) => {
                self.completion.succeed(&self.ctx, vec![asset]).await
            }
            PollOutcome::Completed(None) => {
                let error = AppError::Provider(format!(
                    "Task {} completed without an asset",
                    job.task_id
                ));
                self.completion
                    .fail(self.ctx.slot_id, self.ctx.job_id, &error)
                    .await
            }
            PollOutcome::Failed(error) => {
                self.completion
                    .fail(self.ctx.slot_id, self.ctx.job_id, &error)
                    .await
            }
        };
        if let Err(e) = result {
            tracing::error!(
                slot_id = %self.ctx.slot_id,
                task_id = %job.task_id,
                error = %e,
                "Failed to record poll result"
            );
        }
    }
}

/// Runs slots end to end: validation, optional recompression, submit with
/// bounded transport retries, and hand-off to the poll scheduler for
/// asynchronous providers.
///
/// Every write coming from a run is guarded by the run's job id, so a slot
/// that was cleared, removed or re-run never sees a stale result.
pub struct SlotOrchestrator {
    store: Arc<SlotStore>,
    scheduler: Arc<PollScheduler>,
    providers: ProviderSet,
    completion: Arc<Completion>,
    config: OrchestratorConfig,
}

impl SlotOrchestrator {
    pub fn new(
        store: Arc<SlotStore>,
        scheduler: Arc<PollScheduler>,
        providers: ProviderSet,
        record_store: Arc<dyn RecordStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let completion = Arc::new(Completion {
            store: store.clone(),
            history: HistorySink::new(record_store.clone()),
            collection: CollectionSink::new(record_store),
            events: None,
        });
        Self {
            store,
            scheduler,
            providers,
            completion,
            config,
        }
    }

    /// Wire the scheduler, slot store and sinks from configuration.
    pub fn from_config(
        config: &Config,
        providers: ProviderSet,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        let scheduler = Arc::new(PollScheduler::new(PollLimits::from_config(config)));
        let store = Arc::new(SlotStore::from_config(config, scheduler.clone()));
        Self::new(
            store,
            scheduler,
            providers,
            record_store,
            OrchestratorConfig::from_config(config),
        )
    }

    /// Emit `(slot, status)` on `sender` whenever a slot succeeds or fails.
    pub fn with_events(mut self, sender: SlotEventSender) -> Self {
        let completion = Completion {
            store: self.store.clone(),
            history: self.completion.history.clone(),
            collection: self.completion.collection.clone(),
            events: Some(sender),
        };
        self.completion = Arc::new(completion);
        self
    }

    pub fn store(&self) -> &Arc<SlotStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    pub fn history(&self) -> &HistorySink {
        &self.completion.history
    }

    pub fn collection(&self) -> &CollectionSink {
        &self.completion.collection
    }

    pub async fn add_slot(&self, inputs: SlotInputs) -> Result<Slot, AppError> {
        self.store.create_slot_with(inputs).await
    }

    pub async fn update_slot(&self, id: SlotId, patch: SlotPatch) -> Result<Slot, AppError> {
        self.store.update_slot(id, patch).await
    }

    pub async fn remove_slot(&self, id: SlotId) -> Result<(), AppError> {
        self.store.remove_slot(id).await
    }

    pub async fn clear_slot(&self, id: SlotId, reset_inputs: bool) -> Result<Slot, AppError> {
        self.store.clear_slot(id, reset_inputs).await
    }

    pub async fn bulk_fill(&self, images: Vec<EncodedImage>) -> BulkFillReport {
        self.store.bulk_fill(images).await
    }

    /// Run one slot.
    ///
    /// Generation failures are recorded on the slot, which is returned with
    /// `status == Failed`. `Err` is reserved for store-level refusals: the
    /// slot does not exist or already has a run in flight.
    pub async fn run_slot(&self, id: SlotId) -> Result<Slot, AppError> {
        let job_id = JobId::new();
        let slot = self.store.begin_run(id, job_id).await?;
        tracing::info!(
            slot_id = %id,
            job_id = %job_id,
            mode = %slot.inputs.mode,
            "Running slot"
        );

        let mut request = match GenerationRequest::from_inputs(&slot.inputs) {
            Ok(request) => request,
            Err(e) => {
                let failed = self.completion.fail(id, job_id, &e).await?;
                return self.settle(id, failed).await;
            }
        };

        let ctx = RunContext {
            slot_id: id,
            job_id,
            mode: request.mode(),
            prompt: request.prompt().to_string(),
            source_images: request.source_images(),
            save_to_collection: slot.inputs.save_to_collection,
        };

        for frame in request.video_frames_mut() {
            match genslot_codec::recompress(
                frame,
                self.config.video_max_dimension,
                self.config.video_jpeg_quality,
            )
            .await
            {
                Ok(smaller) => *frame = smaller,
                Err(e) => {
                    let failed = self.completion.fail(id, job_id, &e.into()).await?;
                    return self.settle(id, failed).await;
                }
            }
        }

        let provider = self.providers.for_mode(ctx.mode);
        let submission = match self.submit_with_retry(&provider, &request, &ctx).await {
            Ok(submission) => submission,
            Err(e) => {
                let failed = self.completion.fail(id, job_id, &e).await?;
                return self.settle(id, failed).await;
            }
        };

        match submission {
            Submission::Completed(results) => {
                let succeeded = self.completion.succeed(&ctx, results).await?;
                self.settle(id, succeeded).await
            }
            Submission::Accepted { task_id } => self.start_polling(ctx, provider, task_id).await,
        }
    }

    /// Run every eligible slot among `ids` concurrently. Slots that are in
    /// flight or missing required inputs are skipped.
    pub async fn run_all(&self, ids: &[SlotId]) -> Vec<(SlotId, Result<Slot, AppError>)> {
        let mut eligible = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get(*id).await {
                Some(slot) if !slot.is_in_flight() && slot.has_required_inputs() => {
                    eligible.push(*id)
                }
                Some(_) => tracing::debug!(slot_id = %id, "Skipping ineligible slot"),
                None => tracing::debug!(slot_id = %id, "Skipping unknown slot"),
            }
        }

        tracing::info!(requested = ids.len(), eligible = eligible.len(), "Running slots");
        join_all(
            eligible
                .into_iter()
                .map(|id| async move { (id, self.run_slot(id).await) }),
        )
        .await
    }

    pub async fn run_all_slots(&self) -> Vec<(SlotId, Result<Slot, AppError>)> {
        let ids: Vec<SlotId> = self.store.slots().await.iter().map(|s| s.id).collect();
        self.run_all(&ids).await
    }

    /// Cancel all poll jobs.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    async fn submit_with_retry(
        &self,
        provider: &Arc<dyn GenerationProvider>,
        request: &GenerationRequest,
        ctx: &RunContext,
    ) -> Result<Submission, AppError> {
        let mut attempt: u32 = 0;
        loop {
            match provider.submit(request).await {
                Ok(submission) => return Ok(submission),
                Err(e) if e.is_retryable() && attempt < self.config.submit_retries => {
                    let delay =
                        compute_retry_backoff(attempt, self.config.retry_base, self.config.retry_cap);
                    attempt += 1;
                    tracing::warn!(
                        slot_id = %ctx.slot_id,
                        provider = provider.name(),
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Submit failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    if !self.store.is_current_job(ctx.slot_id, ctx.job_id).await {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn start_polling(
        &self,
        ctx: RunContext,
        provider: Arc<dyn GenerationProvider>,
        task_id: String,
    ) -> Result<Slot, AppError> {
        let (slot_id, job_id) = (ctx.slot_id, ctx.job_id);
        let patch = SlotPatch::new()
            .status(SlotStatus::Polling)
            .task_id(Some(task_id.clone()));
        let Some(slot) = self.store.update_if_job(slot_id, job_id, patch).await? else {
            return self.settle(slot_id, None).await;
        };

        let observer = Arc::new(SlotPollObserver {
            completion: self.completion.clone(),
            ctx,
        });
        if let Err(e) = self.scheduler.start(
            job_id,
            task_id,
            self.config.poll_interval,
            provider,
            observer,
        ) {
            let failed = self.completion.fail(slot_id, job_id, &e).await?;
            return self.settle(slot_id, failed).await;
        }

        // Cleared or removed between the status write and the start
        if !self.store.is_current_job(slot_id, job_id).await {
            self.scheduler.cancel(job_id).await;
        }
        Ok(slot)
    }

    /// The slot as the run left it, or as it is now if the run's write was
    /// dropped because the slot moved on.
    async fn settle(&self, id: SlotId, slot: Option<Slot>) -> Result<Slot, AppError> {
        match slot {
            Some(slot) => Ok(slot),
            None => self
                .store
                .get(id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("slot {}", id))),
        }
    }
}
