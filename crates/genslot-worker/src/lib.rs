//! genslot worker
//!
//! Slot orchestration: the [`SlotStore`] holding every slot, the
//! [`PollScheduler`] driving asynchronous jobs, and the [`SlotOrchestrator`]
//! tying both to the codec, the providers and the history sink.

pub mod orchestrator;
pub mod poll;
pub mod slots;

pub use orchestrator::{OrchestratorConfig, SlotEventSender, SlotOrchestrator};
pub use poll::{JobState, PollLimits, PollObserver, PollOutcome, PollScheduler, PollUpdate};
pub use slots::{BulkFillReport, SlotStore};
