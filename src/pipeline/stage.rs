//! Stage executors: one collaborator call each, bounded by cancellation and a deadline.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::progress::SyntheticProgress;
use super::wire::{GenerationRequest, GenerationResponse, GroundingRequest};
use super::{GenerationService, GroundingService};
use crate::models::input::GenerationInput;
use crate::models::keyword::Keyword;
use crate::AppError;

/// A network-bound step of the session pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Keyword grounding.
    Grounding,
    /// Metadata generation.
    Generation,
}

impl Stage {
    /// Lowercase stage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grounding => "grounding",
            Self::Generation => "generation",
        }
    }

    /// Progress window `(start, end)` the stage reports inside.
    #[must_use]
    pub fn percent_range(self) -> (u8, u8) {
        match self {
            Self::Grounding => (5, 30),
            Self::Generation => (35, 90),
        }
    }

    /// Labels shown while the call is outstanding; the first marks the stage start.
    #[must_use]
    pub fn step_labels(self) -> &'static [&'static str] {
        match self {
            Self::Grounding => &[
                "Grounding keywords",
                "Searching knowledge base",
                "Ranking keywords",
            ],
            Self::Generation => &[
                "Generating content",
                "Drafting description",
                "Building timestamps",
                "Writing FAQ",
                "Scoring content",
            ],
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The session's cancellation token fired.
    Cancelled,
    /// The stage deadline elapsed; the call was abandoned.
    TimedOut {
        /// Stage that overran.
        stage: Stage,
        /// Configured deadline.
        after: Duration,
    },
    /// The collaborator call failed.
    Service(AppError),
}

impl StageError {
    /// The single message recorded on a failed session.
    ///
    /// Upstream failures keep the server-provided text verbatim.
    #[must_use]
    pub fn session_message(&self) -> String {
        match self {
            Self::Service(err) => err.message().to_owned(),
            other => other.to_string(),
        }
    }
}

impl Display for StageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::TimedOut { stage, after } => {
                write!(f, "{stage} stage timed out after {}s", after.as_secs())
            }
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StageError {}

/// Await `call` unless the session is cancelled or `deadline` passes first.
///
/// Losing either race drops the call future, which aborts an in-flight
/// request at the transport. A call that resolves in the same instant as
/// a cancellation still reports `Cancelled`.
async fn run_stage<T>(
    stage: Stage,
    call: impl Future<Output = crate::Result<T>>,
    cancel: &CancellationToken,
    deadline: Duration,
    progress: &SyntheticProgress,
) -> Result<T, StageError> {
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }

    let (start, _) = stage.percent_range();
    progress.report(start, stage.step_labels()[0]);
    let _ticker = progress.start(stage);
    let started = Instant::now();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StageError::Cancelled),
        () = tokio::time::sleep(deadline) => Err(StageError::TimedOut { stage, after: deadline }),
        result = call => result.map_err(StageError::Service),
    };

    if cancel.is_cancelled() {
        debug!(%stage, "discarding stage outcome after cancellation");
        return Err(StageError::Cancelled);
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Ok(value) => {
            info!(%stage, elapsed_ms, "stage finished");
            Ok(value)
        }
        Err(err) => {
            info!(%stage, elapsed_ms, %err, "stage did not finish");
            Err(err)
        }
    }
}

/// Propose keywords for `input` through the grounding service.
///
/// # Errors
///
/// Returns [`StageError::Cancelled`] when `cancel` fires before or during
/// the call, [`StageError::TimedOut`] when `deadline` elapses, and
/// [`StageError::Service`] for collaborator failures.
pub async fn run_grounding(
    service: &dyn GroundingService,
    input: &GenerationInput,
    cancel: &CancellationToken,
    deadline: Duration,
    progress: &SyntheticProgress,
) -> Result<Vec<Keyword>, StageError> {
    let request = GroundingRequest::from(input);
    let response = run_stage(
        Stage::Grounding,
        service.ground(request),
        cancel,
        deadline,
        progress,
    )
    .await?;
    Ok(response.keywords)
}

/// Generate metadata for `input` with the given keywords.
///
/// # Errors
///
/// Same contract as [`run_grounding`].
pub async fn run_generation(
    service: &dyn GenerationService,
    input: &GenerationInput,
    keywords: &[Keyword],
    cancel: &CancellationToken,
    deadline: Duration,
    progress: &SyntheticProgress,
) -> Result<GenerationResponse, StageError> {
    let request = GenerationRequest::new(input, keywords);
    run_stage(
        Stage::Generation,
        service.generate(request),
        cancel,
        deadline,
        progress,
    )
    .await
}
