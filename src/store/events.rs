//! Events published on every session mutation for live UI updates.

use serde::Serialize;

use crate::models::session::SessionStatus;

/// Capacity of the broadcast channel; slow subscribers skip older events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification emitted by the [`SessionStore`](super::SessionStore).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A session was enqueued.
    Queued {
        /// New session.
        session_id: String,
    },
    /// A session moved to a new status.
    StatusChanged {
        /// Session that changed.
        session_id: String,
        /// Status after the change.
        status: SessionStatus,
    },
    /// A session's progress estimate moved forward.
    Progress {
        /// Session that progressed.
        session_id: String,
        /// Completion estimate.
        percent: u8,
        /// Current stage label.
        label: String,
    },
}

impl QueueEvent {
    /// The session this event refers to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Queued { session_id }
            | Self::StatusChanged { session_id, .. }
            | Self::Progress { session_id, .. } => session_id,
        }
    }

    /// SSE event name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::StatusChanged { .. } => "status_changed",
            Self::Progress { .. } => "progress",
        }
    }
}
