//! Read-only queue summary for UI polling.

use serde::{Deserialize, Serialize};

/// Session counts grouped by lifecycle phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueStatus {
    /// Sessions waiting for a slot.
    pub pending: usize,
    /// Sessions in `grounding` or `generating`.
    pub active: usize,
    /// Sessions that completed.
    pub completed: usize,
    /// Sessions that failed or were cancelled.
    pub failed: usize,
    /// All sessions in the store.
    pub total: usize,
}
