//! Progress tracking for an active generation session.

use serde::{Deserialize, Serialize};

/// Highest percentage reachable before a session settles as completed.
pub const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Percentage plus a human-readable stage label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Progress {
    /// Completion estimate, 0–100.
    pub percent: u8,
    /// Current stage description.
    pub label: String,
}

impl Progress {
    /// Initial progress for a freshly queued session.
    #[must_use]
    pub fn queued() -> Self {
        Self {
            percent: 0,
            label: "Queued".into(),
        }
    }

    /// Final progress for a completed session.
    #[must_use]
    pub fn done() -> Self {
        Self {
            percent: 100,
            label: "Completed".into(),
        }
    }

    /// Move forward to `percent`, never backwards and never to 100.
    ///
    /// Returns `true` when anything changed. An empty label keeps the
    /// current one.
    pub fn advance(&mut self, percent: u8, label: &str) -> bool {
        let next = percent.min(MAX_IN_FLIGHT_PERCENT).max(self.percent);
        let label = label.trim();
        let relabel = !label.is_empty() && label != self.label;
        if next == self.percent && !relabel {
            return false;
        }
        self.percent = next;
        if relabel {
            label.clone_into(&mut self.label);
        }
        true
    }
}
