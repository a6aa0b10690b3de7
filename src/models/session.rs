//! Generation session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::input::GenerationInput;
use super::keyword::Keyword;
use super::progress::Progress;
use super::result::GenerationResult;

/// Lifecycle status for a generation session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Queued, waiting for an execution slot.
    Pending,
    /// Proposing keywords via the grounding service.
    Grounding,
    /// Producing metadata via the generation pipeline.
    Generating,
    /// Result assembled.
    Completed,
    /// A stage failed; see the session error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl SessionStatus {
    /// Whether the session occupies an execution slot.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Grounding | Self::Generating)
    }

    /// Whether no further transitions can occur.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase name as used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Grounding => "grounding",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = crate::AppError;

    fn from_str(raw: &str) -> crate::Result<Self> {
        match raw {
            "pending" => Ok(Self::Pending),
            "grounding" => Ok(Self::Grounding),
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::AppError::Validation(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// One queued unit of content-generation work for a single product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationSession {
    /// Unique record identifier.
    pub id: String,
    /// Monotonic enqueue sequence; breaks `created_at` ties for FIFO order.
    pub seq: u64,
    /// Enqueue snapshot; immutable after creation.
    pub input: GenerationInput,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Progress estimate.
    pub progress: Progress,
    /// Keywords proposed by the grounding stage, if it ran.
    pub grounded_keywords: Option<Vec<Keyword>>,
    /// Present only when `status == Completed`.
    pub result: Option<GenerationResult>,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    /// Draft record id returned by the persistence service.
    pub draft_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// When a terminal status was reached.
    pub settled_at: Option<DateTime<Utc>>,
}

impl GenerationSession {
    /// Construct a new pending session with a generated identifier.
    #[must_use]
    pub fn new(input: GenerationInput, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            seq,
            input,
            status: SessionStatus::Pending,
            progress: Progress::queued(),
            grounded_keywords: None,
            result: None,
            error: None,
            draft_id: None,
            created_at: now,
            updated_at: now,
            settled_at: None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (
                SessionStatus::Pending,
                SessionStatus::Grounding | SessionStatus::Generating | SessionStatus::Cancelled
            ) | (
                SessionStatus::Grounding,
                SessionStatus::Generating | SessionStatus::Failed | SessionStatus::Cancelled
            ) | (
                SessionStatus::Generating,
                SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
            )
        )
    }

    /// Keywords the generation stage should use.
    #[must_use]
    pub fn effective_keywords(&self) -> &[Keyword] {
        match self.grounded_keywords {
            Some(ref grounded) if self.input.selected_keywords.is_empty() => grounded,
            _ => &self.input.selected_keywords,
        }
    }
}
