//! Session store: the single owner of mutable generation state.
//!
//! Every mutation runs inside one critical section on a
//! `std::sync::Mutex` and never spans an `.await`, so each call is atomic
//! with respect to the scheduler's driver tasks. Consistency is
//! per-session only; there are no cross-session transactions apart from
//! [`claim_next`](SessionStore::claim_next) and
//! [`cancel_all_pending`](SessionStore::cancel_all_pending), which read
//! the whole table under the same lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::events::{QueueEvent, EVENT_CHANNEL_CAPACITY};
use crate::models::input::GenerationInput;
use crate::models::keyword::Keyword;
use crate::models::progress::Progress;
use crate::models::queue::QueueStatus;
use crate::models::result::GenerationResult;
use crate::models::session::{GenerationSession, SessionStatus};
use crate::{AppError, Result};

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, GenerationSession>,
    next_seq: u64,
}

impl StoreInner {
    fn session_mut(&mut self, id: &str) -> Result<&mut GenerationSession> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
    }

    fn in_fifo_order<'a>(
        &'a self,
        filter: impl Fn(&GenerationSession) -> bool + 'a,
    ) -> Vec<&'a GenerationSession> {
        let mut matching: Vec<&GenerationSession> =
            self.sessions.values().filter(|&s| filter(s)).collect();
        matching.sort_by_key(|s| (s.created_at, s.seq));
        matching
    }
}

/// Process-lifetime table of generation sessions keyed by session ID.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<QueueEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(StoreInner::default()),
            events,
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: QueueEvent) {
        // No subscribers is the normal case outside the HTTP surface.
        let _ = self.events.send(event);
    }

    fn publish_status(&self, session: &GenerationSession) {
        self.publish(QueueEvent::StatusChanged {
            session_id: session.id.clone(),
            status: session.status,
        });
    }

    /// Validate `input` and create a session in `pending` status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if required fields are missing.
    pub fn insert(&self, input: GenerationInput) -> Result<String> {
        input.validate()?;

        let session = {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let session = GenerationSession::new(input, seq);
            inner.sessions.insert(session.id.clone(), session.clone());
            session
        };

        info!(session_id = %session.id, product = %session.input.product_name, "session queued");
        self.publish(QueueEvent::Queued {
            session_id: session.id.clone(),
        });
        Ok(session.id)
    }

    /// Retrieve a session snapshot by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub fn get(&self, id: &str) -> Result<GenerationSession> {
        self.lock()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
    }

    /// All sessions, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<GenerationSession> {
        let inner = self.lock();
        inner.in_fifo_order(|_| true).into_iter().cloned().collect()
    }

    /// Sessions with the given status, oldest first.
    #[must_use]
    pub fn list_by_status(&self, status: SessionStatus) -> Vec<GenerationSession> {
        let inner = self.lock();
        inner
            .in_fifo_order(move |s| s.status == status)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of sessions currently occupying an execution slot.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.status.is_active())
            .count()
    }

    /// Session counts for UI polling.
    #[must_use]
    pub fn queue_status(&self) -> QueueStatus {
        let inner = self.lock();
        let mut status = QueueStatus {
            total: inner.sessions.len(),
            ..QueueStatus::default()
        };
        for session in inner.sessions.values() {
            match session.status {
                SessionStatus::Pending => status.pending += 1,
                SessionStatus::Grounding | SessionStatus::Generating => status.active += 1,
                SessionStatus::Completed => status.completed += 1,
                SessionStatus::Failed | SessionStatus::Cancelled => status.failed += 1,
            }
        }
        status
    }

    /// Move a session to a status that carries no payload.
    ///
    /// `Completed` and `Failed` are reached only through
    /// [`set_result`](Self::set_result) and [`set_error`](Self::set_error).
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown session and
    /// `AppError::InvalidTransition` for an edge outside the state machine.
    pub fn update_status(&self, id: &str, status: SessionStatus) -> Result<GenerationSession> {
        if matches!(status, SessionStatus::Completed | SessionStatus::Failed) {
            return Err(AppError::InvalidTransition(format!(
                "{} requires a payload",
                status.as_str()
            )));
        }

        let session = {
            let mut inner = self.lock();
            let session = inner.session_mut(id)?;
            transition(session, status)?;
            session.clone()
        };

        debug!(session_id = id, status = status.as_str(), "session status updated");
        self.publish_status(&session);
        Ok(session)
    }

    /// Advance the progress estimate of an active session.
    ///
    /// Returns `Ok(false)` when nothing changed, including when the
    /// session has already left its active phase.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub fn update_progress(&self, id: &str, percent: u8, label: &str) -> Result<bool> {
        let progress = {
            let mut inner = self.lock();
            let session = inner.session_mut(id)?;
            if !session.status.is_active() || !session.progress.advance(percent, label) {
                return Ok(false);
            }
            session.updated_at = Utc::now();
            session.progress.clone()
        };

        self.publish(QueueEvent::Progress {
            session_id: id.to_owned(),
            percent: progress.percent,
            label: progress.label,
        });
        Ok(true)
    }

    /// Record keywords proposed by the grounding stage.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless the session is grounding.
    pub fn set_grounded_keywords(&self, id: &str, keywords: Vec<Keyword>) -> Result<()> {
        let mut inner = self.lock();
        let session = inner.session_mut(id)?;
        if session.status != SessionStatus::Grounding {
            return Err(AppError::InvalidTransition(format!(
                "cannot record keywords while {}",
                session.status.as_str()
            )));
        }
        session.grounded_keywords = Some(keywords);
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Settle a session as completed with its assembled result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless the session is generating.
    pub fn set_result(&self, id: &str, result: GenerationResult) -> Result<GenerationSession> {
        let session = {
            let mut inner = self.lock();
            let session = inner.session_mut(id)?;
            transition(session, SessionStatus::Completed)?;
            session.result = Some(result);
            session.progress = Progress::done();
            session.clone()
        };

        info!(session_id = id, "session completed");
        self.publish_status(&session);
        Ok(session)
    }

    /// Settle a session as failed with a single error message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless the session is active.
    pub fn set_error(&self, id: &str, message: impl Into<String>) -> Result<GenerationSession> {
        let session = {
            let mut inner = self.lock();
            let session = inner.session_mut(id)?;
            transition(session, SessionStatus::Failed)?;
            session.error = Some(message.into());
            session.clone()
        };

        info!(session_id = id, error = ?session.error, "session failed");
        self.publish_status(&session);
        Ok(session)
    }

    /// Attach the draft id returned by the persistence service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` unless the session is completed.
    pub fn set_draft_id(&self, id: &str, draft_id: String) -> Result<()> {
        let mut inner = self.lock();
        let session = inner.session_mut(id)?;
        if session.status != SessionStatus::Completed {
            return Err(AppError::InvalidTransition(
                "draft id requires a completed session".into(),
            ));
        }
        session.draft_id = Some(draft_id);
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Claim the oldest pending session if fewer than `ceiling` are active.
    ///
    /// The capacity check, FIFO selection, and the `pending -> grounding`
    /// (or `pending -> generating` when keywords were supplied) transition
    /// happen under one lock, so a session is never claimed twice.
    #[must_use]
    pub fn claim_next(&self, ceiling: usize) -> Option<GenerationSession> {
        let claimed = {
            let mut inner = self.lock();
            let active = inner
                .sessions
                .values()
                .filter(|s| s.status.is_active())
                .count();
            if active >= ceiling {
                return None;
            }

            let next_id = inner
                .in_fifo_order(|s| s.status == SessionStatus::Pending)
                .first()
                .map(|s| s.id.clone())?;
            let session = inner.sessions.get_mut(&next_id)?;
            let first_stage = if session.input.needs_grounding() {
                SessionStatus::Grounding
            } else {
                SessionStatus::Generating
            };
            transition(session, first_stage).ok()?;
            session.clone()
        };

        debug!(session_id = %claimed.id, status = claimed.status.as_str(), "session claimed");
        self.publish_status(&claimed);
        Some(claimed)
    }

    /// Cancel a session that has not started yet.
    ///
    /// Returns the status observed before the call; the session was
    /// cancelled here only if that status is `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub fn cancel_if_pending(&self, id: &str) -> Result<SessionStatus> {
        let (prior, session) = {
            let mut inner = self.lock();
            let session = inner.session_mut(id)?;
            let prior = session.status;
            if prior != SessionStatus::Pending {
                return Ok(prior);
            }
            transition(session, SessionStatus::Cancelled)?;
            (prior, session.clone())
        };

        info!(session_id = id, "pending session cancelled");
        self.publish_status(&session);
        Ok(prior)
    }

    /// Cancel every pending session, returning their identifiers.
    #[must_use]
    pub fn cancel_all_pending(&self) -> Vec<String> {
        let cancelled: Vec<GenerationSession> = {
            let mut inner = self.lock();
            let ids: Vec<String> = inner
                .in_fifo_order(|s| s.status == SessionStatus::Pending)
                .into_iter()
                .map(|s| s.id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| {
                    let session = inner.sessions.get_mut(id)?;
                    transition(session, SessionStatus::Cancelled).ok()?;
                    Some(session.clone())
                })
                .collect()
        };

        for session in &cancelled {
            self.publish_status(session);
        }
        cancelled.into_iter().map(|s| s.id).collect()
    }

    /// Delete terminal sessions settled before `cutoff`.
    ///
    /// Never called by the scheduler; the host decides when to purge.
    #[must_use]
    pub fn purge_settled(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, s| !(s.status.is_terminal() && s.settled_at.is_some_and(|t| t < cutoff)));
        before - inner.sessions.len()
    }
}

fn transition(session: &mut GenerationSession, next: SessionStatus) -> Result<()> {
    if !session.can_transition_to(next) {
        return Err(AppError::InvalidTransition(format!(
            "{} -> {}",
            session.status.as_str(),
            next.as_str()
        )));
    }
    let now = Utc::now();
    session.status = next;
    session.updated_at = now;
    if next.is_terminal() {
        session.settled_at = Some(now);
    }
    Ok(())
}
