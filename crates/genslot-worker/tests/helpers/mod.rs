#![allow(dead_code)]

pub mod fixtures;
pub mod providers;

use genslot_providers::ProviderSet;
use genslot_storage::{MemoryRecordStore, RecordStore};
use genslot_worker::{
    OrchestratorConfig, PollLimits, PollScheduler, SlotOrchestrator, SlotStore,
};
use genslot_core::models::{SlotId, SlotStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Orchestrator wired for tests
pub struct TestHarness {
    pub orchestrator: Arc<SlotOrchestrator>,
    pub events: mpsc::Receiver<(SlotId, SlotStatus)>,
}

pub fn setup_harness(providers: ProviderSet, min_slots: usize, max_slots: usize) -> TestHarness {
    setup_harness_with_store(
        providers,
        min_slots,
        max_slots,
        Arc::new(MemoryRecordStore::new()),
    )
}

pub fn setup_harness_with_store(
    providers: ProviderSet,
    min_slots: usize,
    max_slots: usize,
    record_store: Arc<dyn RecordStore>,
) -> TestHarness {
    let scheduler = Arc::new(PollScheduler::new(PollLimits {
        max_polls: 50,
        max_duration: Duration::from_secs(10),
    }));
    let store = Arc::new(SlotStore::new(min_slots, max_slots, scheduler.clone()));
    let config = OrchestratorConfig {
        retry_base: Duration::from_millis(1),
        retry_cap: Duration::from_millis(5),
        poll_interval: POLL_INTERVAL,
        ..OrchestratorConfig::default()
    };
    let (tx, rx) = mpsc::channel(64);
    let orchestrator = SlotOrchestrator::new(store, scheduler, providers, record_store, config)
        .with_events(tx);

    TestHarness {
        orchestrator: Arc::new(orchestrator),
        events: rx,
    }
}

impl TestHarness {
    /// Next terminal event, failing the test after two seconds.
    pub async fn next_event(&mut self) -> (SlotId, SlotStatus) {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for slot event")
            .expect("event channel closed")
    }

    /// Assert no terminal event arrives within `window`.
    pub async fn expect_no_event(&mut self, window: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(window, self.events.recv()).await {
            panic!("unexpected slot event {:?}", event);
        }
    }
}
