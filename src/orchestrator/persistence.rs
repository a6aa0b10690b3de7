//! Persistence bridge: hand completed results to the draft service.
//!
//! Saving is decoupled from completion. The session is already
//! `completed` when the bridge runs, and a failed or slow save is only
//! logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::models::session::GenerationSession;
use crate::pipeline::wire::DraftRequest;
use crate::pipeline::PersistenceService;
use crate::store::SessionStore;

/// Saves completed sessions as drafts.
#[derive(Clone)]
pub struct PersistenceBridge {
    service: Arc<dyn PersistenceService>,
    timeout: Duration,
}

impl PersistenceBridge {
    /// Create a bridge with a per-call deadline.
    #[must_use]
    pub fn new(service: Arc<dyn PersistenceService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Save `session`'s result and record the returned draft id.
    ///
    /// Returns the draft id on success. Sessions without a result are
    /// skipped.
    pub async fn persist(&self, store: &SessionStore, session: &GenerationSession) -> Option<String> {
        let result = session.result.clone()?;
        let request = DraftRequest {
            session_id: session.id.clone(),
            result,
            input: session.input.clone(),
        };

        match tokio::time::timeout(self.timeout, self.service.save_draft(request)).await {
            Ok(Ok(draft)) => {
                if let Err(err) = store.set_draft_id(&session.id, draft.id.clone()) {
                    warn!(session_id = %session.id, %err, "failed to record draft id");
                }
                info!(session_id = %session.id, draft_id = %draft.id, "draft saved");
                Some(draft.id)
            }
            Ok(Err(err)) => {
                warn!(session_id = %session.id, %err, "draft persistence failed; session stays completed");
                None
            }
            Err(_) => {
                warn!(
                    session_id = %session.id,
                    timeout_secs = self.timeout.as_secs(),
                    "draft persistence timed out; session stays completed"
                );
                None
            }
        }
    }
}
