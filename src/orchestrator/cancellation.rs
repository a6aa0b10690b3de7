//! Cancellation registry: session ID to in-flight cancellation token.
//!
//! A claim and the registration of its token happen while the registry
//! lock is held, and [`cancel`](CancellationRegistry::cancel) inspects the
//! store under the same lock. A caller therefore never observes an active
//! session that has no handle yet. Lock order is always registry, then
//! store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::session::{GenerationSession, SessionStatus};
use crate::store::SessionStore;
use crate::Result;

/// What [`CancellationRegistry::cancel`] did.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The session was pending and is now `cancelled`.
    Cancelled,
    /// The session is active; its token was signalled and it settles as
    /// `cancelled` once its stage observes the signal.
    Signalled,
    /// The session had already reached a terminal status.
    AlreadySettled,
}

/// What [`CancellationRegistry::cancel_all`] did.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CancelAllSummary {
    /// Pending sessions moved straight to `cancelled`.
    pub cancelled_pending: usize,
    /// Active sessions whose tokens were signalled.
    pub signalled_active: usize,
}

/// Mapping from session ID to the token of its running pipeline.
#[derive(Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `claim` and register a fresh token for the session it returns.
    ///
    /// `claim` is not called while `ceiling` handles are registered. A
    /// handle outlives its session's active status until the driver has
    /// persisted the result, so a slot frees only after persistence.
    pub fn claim(
        &self,
        ceiling: usize,
        claim: impl FnOnce() -> Option<GenerationSession>,
    ) -> Option<(GenerationSession, CancellationToken)> {
        let mut handles = self.lock();
        if handles.len() >= ceiling {
            return None;
        }
        let session = claim()?;
        let token = CancellationToken::new();
        handles.insert(session.id.clone(), token.clone());
        debug!(session_id = %session.id, "cancellation handle registered");
        Some((session, token))
    }

    /// Cancel one session.
    ///
    /// A pending session is cancelled in the store without running any
    /// stage; an active session has its token signalled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub fn cancel(&self, store: &SessionStore, id: &str) -> Result<CancelOutcome> {
        let handles = self.lock();
        let prior = store.cancel_if_pending(id)?;
        let outcome = match prior {
            SessionStatus::Pending => CancelOutcome::Cancelled,
            SessionStatus::Grounding | SessionStatus::Generating => {
                if let Some(token) = handles.get(id) {
                    token.cancel();
                }
                CancelOutcome::Signalled
            }
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled => {
                CancelOutcome::AlreadySettled
            }
        };
        info!(session_id = id, ?outcome, "cancel requested");
        Ok(outcome)
    }

    /// Cancel every pending session and signal every active one.
    ///
    /// Handles of sessions that already settled are left alone. Best
    /// effort: each signalled session settles independently.
    #[must_use]
    pub fn cancel_all(&self, store: &SessionStore) -> CancelAllSummary {
        let handles = self.lock();
        let cancelled_pending = store.cancel_all_pending().len();
        let mut signalled_active = 0;
        for (id, token) in &*handles {
            // Settled sessions keep their handle until persistence is done.
            let active = store.get(id).is_ok_and(|s| s.status.is_active());
            if active && !token.is_cancelled() {
                token.cancel();
                signalled_active += 1;
            }
        }
        let summary = CancelAllSummary {
            cancelled_pending,
            signalled_active,
        };
        info!(?summary, "cancel all requested");
        summary
    }

    /// Remove a settled session's token. Returns whether one was present.
    pub fn release(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!(session_id = id, "cancellation handle released");
        }
        removed
    }

    /// Whether a token is registered for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no tokens are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
