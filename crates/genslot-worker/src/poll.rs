//! Poll scheduler: drives accepted asynchronous jobs to a terminal state.
//!
//! Every job runs in its own tokio task with its own cancellation token, so a
//! slow or failing provider only ever delays its own job. Callbacks run while
//! the job's state lock is held and only after checking the job is still live;
//! [`PollScheduler::cancel`] takes the same lock, which is what guarantees no
//! callback fires once `cancel` has returned.
//!
//! Callbacks must not call `cancel` for their own job.

use async_trait::async_trait;
use genslot_core::models::{Asset, GenerationJob, JobId, RemoteStatus};
use genslot_core::{AppError, ErrorMetadata};
use genslot_providers::GenerationProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Per-job state machine: `Pending -> Processing -> {Completed | Failed}`,
/// with `Cancelled` reachable from the two non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Limits applied to every job
#[derive(Debug, Clone)]
pub struct PollLimits {
    pub max_polls: u32,
    pub max_duration: Duration,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            max_polls: 120,
            max_duration: Duration::from_secs(900),
        }
    }
}

impl PollLimits {
    pub fn from_config(config: &genslot_core::Config) -> Self {
        Self {
            max_polls: config.max_polls(),
            max_duration: config.max_poll_duration(),
        }
    }
}

/// Non-terminal tick report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollUpdate {
    pub job_id: JobId,
    pub task_id: String,
    /// Last status the provider reported, if any yet
    pub status: Option<RemoteStatus>,
    pub poll_count: u32,
    /// Set when the tick was a transient miss rather than a provider answer
    pub advisory: Option<String>,
}

/// How a job ended.
#[derive(Debug)]
pub enum PollOutcome {
    Completed(Option<Asset>),
    Failed(AppError),
}

/// Receiver of job callbacks
#[async_trait]
pub trait PollObserver: Send + Sync {
    /// Called for every non-terminal tick
    async fn on_update(&self, update: PollUpdate);

    /// Called exactly once per job that was not cancelled
    async fn on_terminal(&self, job: GenerationJob, outcome: PollOutcome);
}

struct JobEntry {
    token: CancellationToken,
    state: Arc<Mutex<JobState>>,
    handle: JoinHandle<()>,
}

type JobMap = Arc<StdMutex<HashMap<JobId, JobEntry>>>;

fn lock_jobs(jobs: &JobMap) -> std::sync::MutexGuard<'_, HashMap<JobId, JobEntry>> {
    // The map is only touched in short, non-panicking sections
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct PollScheduler {
    jobs: JobMap,
    limits: PollLimits,
}

impl PollScheduler {
    pub fn new(limits: PollLimits) -> Self {
        Self {
            jobs: Arc::new(StdMutex::new(HashMap::new())),
            limits,
        }
    }

    /// Begin polling `task_id` every `interval`. The first status check
    /// happens one interval after start.
    pub fn start(
        &self,
        job_id: JobId,
        task_id: impl Into<String>,
        interval: Duration,
        provider: Arc<dyn GenerationProvider>,
        observer: Arc<dyn PollObserver>,
    ) -> Result<(), AppError> {
        if interval.is_zero() {
            return Err(AppError::Config(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        let task_id = task_id.into();
        let mut jobs = lock_jobs(&self.jobs);
        if jobs.contains_key(&job_id) {
            return Err(AppError::Internal(format!("job {} is already polling", job_id)));
        }

        let token = CancellationToken::new();
        let state = Arc::new(Mutex::new(JobState::Pending));
        let job = GenerationJob::new(job_id, task_id);

        tracing::info!(
            job_id = %job_id,
            task_id = %job.task_id,
            provider = provider.name(),
            interval_ms = interval.as_millis() as u64,
            "Starting poll job"
        );

        // Inserted under the map lock, so the job cannot try to remove itself
        // before it is registered.
        let handle = tokio::spawn(run_job(
            job,
            interval,
            self.limits.clone(),
            provider,
            observer,
            token.clone(),
            state.clone(),
            self.jobs.clone(),
        ));
        jobs.insert(
            job_id,
            JobEntry {
                token,
                state,
                handle,
            },
        );
        Ok(())
    }

    /// Stop polling `job_id`. Once this returns, no callback for the job will
    /// run. Unknown or already finished jobs are a no-op; returns whether a
    /// live job was cancelled.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let entry = lock_jobs(&self.jobs).remove(&job_id);
        let Some(entry) = entry else {
            return false;
        };

        entry.token.cancel();
        let mut state = entry.state.lock().await;
        let cancelled = !state.is_finished();
        if cancelled {
            *state = JobState::Cancelled;
            tracing::info!(job_id = %job_id, "Poll job cancelled");
        }
        cancelled
    }

    pub fn is_active(&self, job_id: JobId) -> bool {
        lock_jobs(&self.jobs).contains_key(&job_id)
    }

    pub fn active_jobs(&self) -> usize {
        lock_jobs(&self.jobs).len()
    }

    /// Cancel every job and wait for their tasks to exit.
    pub async fn shutdown(&self) {
        let entries: Vec<(JobId, JobEntry)> = lock_jobs(&self.jobs).drain().collect();
        let count = entries.len();
        for (_, entry) in &entries {
            entry.token.cancel();
        }
        for (job_id, entry) in entries {
            {
                let mut state = entry.state.lock().await;
                if !state.is_finished() {
                    *state = JobState::Cancelled;
                }
            }
            if let Err(e) = entry.handle.await {
                tracing::warn!(job_id = %job_id, error = %e, "Poll job task ended abnormally");
            }
        }
        tracing::info!(jobs = count, "Poll scheduler shut down");
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(PollLimits::default())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    mut job: GenerationJob,
    interval: Duration,
    limits: PollLimits,
    provider: Arc<dyn GenerationProvider>,
    observer: Arc<dyn PollObserver>,
    token: CancellationToken,
    state: Arc<Mutex<JobState>>,
    jobs: JobMap,
) {
    let job_id = job.job_id;
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        job.poll_count += 1;
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = provider.poll_status(&job.task_id) => result,
        };

        let mut current = state.lock().await;
        if *current == JobState::Cancelled || token.is_cancelled() {
            tracing::debug!(job_id = %job_id, "Discarding poll response for cancelled job");
            break;
        }

        let terminal = match result {
            Ok(report) => {
                job.last_status = Some(report.status);
                tracing::debug!(
                    job_id = %job_id,
                    task_id = %job.task_id,
                    poll_count = job.poll_count,
                    status = %report.status,
                    "Poll tick"
                );
                match report.status {
                    RemoteStatus::Completed => {
                        Some((JobState::Completed, PollOutcome::Completed(report.asset)))
                    }
                    RemoteStatus::Failed => {
                        let message = report
                            .error_message
                            .unwrap_or_else(|| "Generation failed".to_string());
                        Some((JobState::Failed, PollOutcome::Failed(AppError::Provider(message))))
                    }
                    RemoteStatus::Pending | RemoteStatus::Processing => {
                        if report.status == RemoteStatus::Processing {
                            *current = JobState::Processing;
                        }
                        observer
                            .on_update(PollUpdate {
                                job_id,
                                task_id: job.task_id.clone(),
                                status: job.last_status,
                                poll_count: job.poll_count,
                                advisory: None,
                            })
                            .await;
                        None
                    }
                }
            }
            // Credentials, configuration and a rejected or unknown task will
            // not fix themselves between ticks
            Err(
                e @ (AppError::Auth(_)
                | AppError::Config(_)
                | AppError::Validation(_)
                | AppError::NotFound(_)),
            ) => Some((JobState::Failed, PollOutcome::Failed(e))),
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    task_id = %job.task_id,
                    poll_count = job.poll_count,
                    error = %e,
                    "Transient poll miss"
                );
                observer
                    .on_update(PollUpdate {
                        job_id,
                        task_id: job.task_id.clone(),
                        status: job.last_status,
                        poll_count: job.poll_count,
                        advisory: Some(e.client_message()),
                    })
                    .await;
                None
            }
        };

        let terminal = terminal.or_else(|| {
            let elapsed = started.elapsed();
            (job.poll_count >= limits.max_polls || elapsed >= limits.max_duration).then(|| {
                (
                    JobState::Failed,
                    PollOutcome::Failed(AppError::Timeout {
                        polls: job.poll_count,
                        elapsed_secs: elapsed.as_secs(),
                    }),
                )
            })
        });

        if let Some((final_state, outcome)) = terminal {
            *current = final_state;
            match &outcome {
                PollOutcome::Completed(_) => {
                    tracing::info!(job_id = %job_id, poll_count = job.poll_count, "Poll job completed")
                }
                PollOutcome::Failed(e) => tracing::warn!(
                    job_id = %job_id,
                    poll_count = job.poll_count,
                    error = %e,
                    "Poll job failed"
                ),
            }
            observer.on_terminal(job.clone(), outcome).await;
            break;
        }
    }

    lock_jobs(&jobs).remove(&job_id);
}
