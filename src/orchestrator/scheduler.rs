//! Queue scheduler: drives every session from `pending` to a terminal status.
//!
//! A background loop wakes on a fixed tick and whenever a session settles
//! or is enqueued. Each wake-up runs one scheduling pass, which claims
//! pending sessions in FIFO order while fewer than the configured ceiling
//! are active, and spawns one driver task per claimed session. The driver
//! runs the stages, settles the session, persists a completed result,
//! releases the cancellation handle, and wakes the loop again.
//!
//! Start the loop with [`QueueScheduler::start`]; stop it with
//! [`SchedulerHandle::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::assembler::assemble;
use super::cancellation::{CancelAllSummary, CancelOutcome, CancellationRegistry};
use super::persistence::PersistenceBridge;
use crate::config::GlobalConfig;
use crate::models::input::GenerationInput;
use crate::models::queue::QueueStatus;
use crate::models::result::{GenerationResult, KeywordSource};
use crate::models::session::{GenerationSession, SessionStatus};
use crate::pipeline::progress::{ProgressSink, SyntheticProgress};
use crate::pipeline::stage::{run_generation, run_grounding, StageError};
use crate::pipeline::{GenerationService, GroundingService, PersistenceService};
use crate::store::SessionStore;
use crate::Result;

/// Progress reported between generation and settlement.
const ASSEMBLY_PERCENT: u8 = 95;

/// Scheduling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum sessions in an active status at once.
    pub max_active_sessions: usize,
    /// Period of the background tick.
    pub tick_interval: Duration,
    /// Cadence of synthetic progress reports.
    pub progress_interval: Duration,
    /// Grounding stage deadline.
    pub grounding_timeout: Duration,
    /// Generation stage deadline.
    pub generation_timeout: Duration,
    /// Draft persistence deadline.
    pub persistence_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: 1,
            tick_interval: Duration::from_secs(1),
            progress_interval: Duration::from_millis(1500),
            grounding_timeout: Duration::from_secs(120),
            generation_timeout: Duration::from_secs(600),
            persistence_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&GlobalConfig> for SchedulerConfig {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            max_active_sessions: config.queue.max_active_sessions,
            tick_interval: config.tick_interval(),
            progress_interval: config.progress_interval(),
            grounding_timeout: config.grounding_timeout(),
            generation_timeout: config.generation_timeout(),
            persistence_timeout: config.persistence_timeout(),
        }
    }
}

/// External collaborators the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    /// Keyword grounding.
    pub grounding: Arc<dyn GroundingService>,
    /// Metadata generation.
    pub generation: Arc<dyn GenerationService>,
    /// Draft storage.
    pub persistence: Arc<dyn PersistenceService>,
}

/// How a session's pipeline ended, before it is written to the store.
#[derive(Debug)]
enum Settlement {
    Completed(GenerationResult),
    Failed(String),
    Cancelled,
}

impl From<StageError> for Settlement {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Cancelled => Self::Cancelled,
            other => Self::Failed(other.session_message()),
        }
    }
}

struct SchedulerInner {
    config: SchedulerConfig,
    store: Arc<SessionStore>,
    registry: CancellationRegistry,
    services: Collaborators,
    persistence: PersistenceBridge,
    wake: Notify,
    in_pass: AtomicBool,
    rerun: AtomicBool,
    drivers: TaskTracker,
}

/// Explicitly constructed queue orchestrator; cheap to clone.
#[derive(Clone)]
pub struct QueueScheduler {
    inner: Arc<SchedulerInner>,
}

impl QueueScheduler {
    /// Build a scheduler over `store` using the given collaborators.
    #[must_use]
    pub fn new(config: SchedulerConfig, store: Arc<SessionStore>, services: Collaborators) -> Self {
        let persistence =
            PersistenceBridge::new(Arc::clone(&services.persistence), config.persistence_timeout);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                store,
                registry: CancellationRegistry::new(),
                services,
                persistence,
                wake: Notify::new(),
                in_pass: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
                drivers: TaskTracker::new(),
            }),
        }
    }

    /// The backing session store.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    /// The scheduling parameters in effect.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Enqueue a session and wake the loop.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for malformed input; nothing is queued.
    pub fn enqueue(&self, input: GenerationInput) -> Result<String> {
        let id = self.inner.store.insert(input)?;
        self.wake();
        Ok(id)
    }

    /// Cancel one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub fn cancel(&self, id: &str) -> Result<CancelOutcome> {
        self.inner.registry.cancel(&self.inner.store, id)
    }

    /// Cancel every pending session and signal every active one.
    #[must_use]
    pub fn cancel_all(&self) -> CancelAllSummary {
        self.inner.registry.cancel_all(&self.inner.store)
    }

    /// Session counts for UI polling.
    #[must_use]
    pub fn queue_status(&self) -> QueueStatus {
        self.inner.store.queue_status()
    }

    /// Number of sessions with a registered cancellation handle.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    /// Ask the background loop to run a pass soon.
    pub fn wake(&self) {
        self.inner.wake.notify_one();
    }

    /// Run one scheduling pass and return how many sessions were started.
    ///
    /// If another pass is already running this call only flags it to run
    /// once more, and returns 0. Must be called inside a tokio runtime.
    pub fn run_pass(&self) -> usize {
        let inner = &self.inner;
        if inner
            .in_pass
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            inner.rerun.store(true, Ordering::Release);
            debug!("scheduling pass already running");
            return 0;
        }

        let ceiling = inner.config.max_active_sessions;
        let mut started = 0;
        loop {
            while let Some((session, token)) = inner
                .registry
                .claim(ceiling, || inner.store.claim_next(ceiling))
            {
                info!(
                    session_id = %session.id,
                    status = session.status.as_str(),
                    "session started"
                );
                let span = info_span!("session", session_id = %session.id);
                inner
                    .drivers
                    .spawn(drive(Arc::clone(inner), session, token).instrument(span));
                started += 1;
            }

            inner.in_pass.store(false, Ordering::Release);
            if !inner.rerun.swap(false, Ordering::AcqRel)
                || inner
                    .in_pass
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
        started
    }

    /// Spawn the background loop.
    #[must_use]
    pub fn start(&self) -> SchedulerHandle {
        let stop = CancellationToken::new();
        let loop_stop = stop.clone();
        let scheduler = self.clone();
        let period = self.inner.config.tick_interval;

        let join = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                info!(
                    ceiling = scheduler.inner.config.max_active_sessions,
                    tick_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                    "scheduler started"
                );
                loop {
                    tokio::select! {
                        () = loop_stop.cancelled() => {
                            info!("scheduler stopping");
                            break;
                        }
                        _ = interval.tick() => {}
                        () = scheduler.inner.wake.notified() => {}
                    }
                    scheduler.run_pass();
                }
            }
            .instrument(info_span!("queue_scheduler")),
        );

        SchedulerHandle {
            stop,
            join: Some(join),
            drivers: self.inner.drivers.clone(),
        }
    }
}

/// Handle returned from [`QueueScheduler::start`]; stops the loop on drop.
pub struct SchedulerHandle {
    stop: CancellationToken,
    join: Option<JoinHandle<()>>,
    drivers: TaskTracker,
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl SchedulerHandle {
    /// Stop the loop and wait for in-flight drivers to settle their sessions.
    ///
    /// No new sessions start after this is called. Drivers are not
    /// cancelled here; call [`QueueScheduler::cancel_all`] first for a
    /// prompt stop.
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                error!(%err, "scheduler loop ended abnormally");
            }
        }
        self.drivers.close();
        self.drivers.wait().await;
        info!("scheduler shut down");
    }
}

/// Releases the session's handle and wakes the loop, even if the driver panics.
struct SlotGuard {
    inner: Arc<SchedulerInner>,
    session_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Ok(session) = self.inner.store.get(&self.session_id) {
            if session.status.is_active() {
                error!(session_id = %self.session_id, "driver exited without settling");
                if let Err(err) = self
                    .inner
                    .store
                    .set_error(&self.session_id, "session driver aborted")
                {
                    warn!(session_id = %self.session_id, %err, "failed to fail aborted session");
                }
            }
        }
        self.inner.registry.release(&self.session_id);
        self.inner.wake.notify_one();
    }
}

/// Run one claimed session to a terminal status.
async fn drive(inner: Arc<SchedulerInner>, session: GenerationSession, cancel: CancellationToken) {
    let _slot = SlotGuard {
        inner: Arc::clone(&inner),
        session_id: session.id.clone(),
    };
    let started = Instant::now();

    let settlement = execute(&inner, &session, &cancel).await;
    settle(&inner, &session.id, settlement).await;

    debug!(
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "session driver finished"
    );
}

fn progress_for(inner: &Arc<SchedulerInner>, session_id: &str) -> SyntheticProgress {
    let store = Arc::clone(&inner.store);
    let id = session_id.to_owned();
    let sink: ProgressSink = Arc::new(move |percent: u8, label: &str| {
        if let Err(err) = store.update_progress(&id, percent, label) {
            debug!(session_id = %id, %err, "progress update dropped");
        }
    });
    SyntheticProgress::new(sink, inner.config.progress_interval)
}

async fn execute(
    inner: &Arc<SchedulerInner>,
    session: &GenerationSession,
    cancel: &CancellationToken,
) -> Settlement {
    let progress = progress_for(inner, &session.id);
    let config = &inner.config;

    let generating = if session.status == SessionStatus::Grounding {
        let found = match run_grounding(
            inner.services.grounding.as_ref(),
            &session.input,
            cancel,
            config.grounding_timeout,
            &progress,
        )
        .await
        {
            Ok(found) => found,
            Err(err) => return err.into(),
        };

        info!(keywords = found.len(), "grounding proposed keywords");
        match inner
            .store
            .set_grounded_keywords(&session.id, found)
            .and_then(|()| {
                inner
                    .store
                    .update_status(&session.id, SessionStatus::Generating)
            }) {
            Ok(updated) => updated,
            Err(err) => return Settlement::Failed(err.to_string()),
        }
    } else {
        session.clone()
    };

    let keywords = generating.effective_keywords().to_vec();
    let keyword_source = if generating.grounded_keywords.is_some() {
        KeywordSource::Grounded
    } else {
        KeywordSource::Supplied
    };

    let response = match run_generation(
        inner.services.generation.as_ref(),
        &session.input,
        &keywords,
        cancel,
        config.generation_timeout,
        &progress,
    )
    .await
    {
        Ok(response) => response,
        Err(err) => return err.into(),
    };

    progress.report(ASSEMBLY_PERCENT, "Assembling result");
    match assemble(&session.input, response, keywords, keyword_source) {
        Ok(_) if cancel.is_cancelled() => Settlement::Cancelled,
        Ok(result) => Settlement::Completed(result),
        Err(err) => Settlement::Failed(err.message().to_owned()),
    }
}

async fn settle(inner: &Arc<SchedulerInner>, session_id: &str, settlement: Settlement) {
    let stored = match settlement {
        Settlement::Completed(result) => match inner.store.set_result(session_id, result) {
            Ok(session) => {
                inner.persistence.persist(&inner.store, &session).await;
                Ok(())
            }
            Err(err) => Err(err),
        },
        Settlement::Failed(message) => inner.store.set_error(session_id, message).map(|_| ()),
        Settlement::Cancelled => {
            info!(session_id, "session cancelled");
            inner
                .store
                .update_status(session_id, SessionStatus::Cancelled)
                .map(|_| ())
        }
    };

    if let Err(err) = stored {
        warn!(session_id, %err, "failed to settle session");
    }
}
