use async_trait::async_trait;
use genslot_core::models::{GenerationRequest, TaskStatusReport};
use genslot_core::AppError;
use genslot_providers::{GenerationProvider, Submission};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SubmitFn = dyn Fn(&GenerationRequest) -> (Duration, Result<Submission, AppError>) + Send + Sync;

/// In-process provider with scripted answers.
pub struct FakeProvider {
    on_submit: Box<SubmitFn>,
    polls: Mutex<VecDeque<Result<TaskStatusReport, AppError>>>,
    poll_delay: Duration,
    submitted: Mutex<Vec<GenerationRequest>>,
    submit_calls: AtomicU32,
    poll_calls: AtomicU32,
}

impl Debug for FakeProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FakeProvider")
            .field("submit_calls", &self.submit_calls())
            .field("poll_calls", &self.poll_calls())
            .finish()
    }
}

impl FakeProvider {
    pub fn new<F>(on_submit: F) -> Self
    where
        F: Fn(&GenerationRequest) -> (Duration, Result<Submission, AppError>)
            + Send
            + Sync
            + 'static,
    {
        Self {
            on_submit: Box::new(on_submit),
            polls: Mutex::new(VecDeque::new()),
            poll_delay: Duration::ZERO,
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicU32::new(0),
            poll_calls: AtomicU32::new(0),
        }
    }

    /// Answers every submit immediately with `result`.
    pub fn replying(result: Result<Submission, AppError>) -> Self {
        let result = Mutex::new(Some(result));
        Self::new(move |_| {
            let next = result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AppError::Provider("already answered".to_string())));
            (Duration::ZERO, next)
        })
    }

    /// Accepts every submit with `task_id`, then replays `polls`.
    pub fn accepting(task_id: &str, polls: Vec<Result<TaskStatusReport, AppError>>) -> Self {
        let task_id = task_id.to_string();
        Self::new(move |_| {
            (
                Duration::ZERO,
                Ok(Submission::Accepted {
                    task_id: task_id.clone(),
                }),
            )
        })
        .with_polls(polls)
    }

    pub fn with_polls(self, polls: Vec<Result<TaskStatusReport, AppError>>) -> Self {
        *self.polls.lock().unwrap() = polls.into();
        self
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<GenerationRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, AppError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());
        let (delay, result) = (self.on_submit)(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn poll_status(&self, _task_id: &str) -> Result<TaskStatusReport, AppError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TaskStatusReport::processing()))
    }
}
