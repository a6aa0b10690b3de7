//! Advisory progress reporting for stage calls.
//!
//! The collaborator services do not stream server-side progress, so while a
//! call is outstanding a background ticker nudges the estimate forward on a
//! fixed cadence. The ticker only ever reports through the sink; it has no
//! say in when a stage finishes, and the store refuses progress for
//! sessions that are no longer active.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::task::AbortOnDropHandle;

use super::stage::Stage;

/// Callback receiving `(percent, label)` progress reports.
pub type ProgressSink = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Progress reporter shared by the stage executors of one session.
#[derive(Clone)]
pub struct SyntheticProgress {
    sink: ProgressSink,
    interval: Duration,
}

impl SyntheticProgress {
    /// Create a reporter that ticks every `interval`.
    #[must_use]
    pub fn new(sink: ProgressSink, interval: Duration) -> Self {
        Self { sink, interval }
    }

    /// A reporter that discards every report.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Arc::new(|_: u8, _: &str| {}), Duration::from_secs(3600))
    }

    /// Report a single progress point.
    pub fn report(&self, percent: u8, label: &str) {
        (self.sink)(percent, label);
    }

    /// Start ticking inside `stage`'s range; stops when the handle drops.
    #[must_use]
    pub fn start(&self, stage: Stage) -> AbortOnDropHandle<()> {
        let sink = Arc::clone(&self.sink);
        let period = self.interval;
        AbortOnDropHandle::new(tokio::spawn(async move {
            let (start, end) = stage.percent_range();
            let labels = stage.step_labels();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; the stage already reported its start.
            interval.tick().await;

            let mut percent = start;
            let mut step = 0usize;
            loop {
                interval.tick().await;
                percent = next_percent(percent, end);
                step = (step + 1).min(labels.len() - 1);
                sink(percent, labels[step]);
            }
        }))
    }
}

/// Close a fifth of the remaining gap, at least one point, never past `end`.
fn next_percent(current: u8, end: u8) -> u8 {
    if current >= end {
        return end;
    }
    let gap = end - current;
    current + (gap / 5).max(1)
}
