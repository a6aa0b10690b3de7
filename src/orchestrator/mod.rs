//! Session orchestration modules.
//!
//! Covers the queue scheduler, the cancellation registry, result
//! assembly, and the draft persistence bridge.

pub mod assembler;
pub mod cancellation;
pub mod persistence;
pub mod scheduler;

pub use cancellation::{CancelAllSummary, CancelOutcome, CancellationRegistry};
pub use scheduler::{Collaborators, QueueScheduler, SchedulerConfig, SchedulerHandle};
