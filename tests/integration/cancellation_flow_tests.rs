//! Integration tests for single and broadcast cancellation.

use std::sync::Arc;

use tokio::sync::Notify;

use metagen_queue::models::session::SessionStatus;
use metagen_queue::orchestrator::CancelOutcome;
use metagen_queue::AppError;

use super::test_helpers::{
    eventually, fast_config, input_with_keywords, input_without_keywords, wait_for_status,
    Harness, Script,
};

#[tokio::test]
async fn cancelling_a_pending_session_never_invokes_a_stage() {
    let harness = Harness::start(fast_config(1));
    harness.generation.script("A", Script::Hang);

    let a = harness.enqueue(input_with_keywords("A"));
    let b = harness.enqueue(input_without_keywords("B"));
    wait_for_status(&harness.store, &a, SessionStatus::Generating).await;

    assert_eq!(harness.scheduler.cancel(&b).unwrap(), CancelOutcome::Cancelled);
    let cancelled = harness.store.get(&b).unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert!(cancelled.error.is_none());

    assert_eq!(harness.scheduler.cancel(&a).unwrap(), CancelOutcome::Signalled);
    wait_for_status(&harness.store, &a, SessionStatus::Cancelled).await;

    assert_eq!(harness.grounding.call_count(), 0);
    assert_eq!(harness.generation.calls(), vec!["A"]);
    harness.shutdown().await;
}

#[tokio::test]
async fn cancelling_an_active_session_settles_cancelled_not_failed() {
    let harness = Harness::start(fast_config(1));
    harness.grounding.script("A", Script::Hang);

    let a = harness.enqueue(input_without_keywords("A"));
    wait_for_status(&harness.store, &a, SessionStatus::Grounding).await;

    assert_eq!(harness.scheduler.cancel(&a).unwrap(), CancelOutcome::Signalled);
    let session = wait_for_status(&harness.store, &a, SessionStatus::Cancelled).await;

    assert!(session.error.is_none());
    assert!(session.result.is_none());
    assert_eq!(harness.generation.call_count(), 0, "later stages never start");
    eventually("handle released", || async {
        harness.scheduler.in_flight() == 0
    })
    .await;
    harness.shutdown().await;
}

#[tokio::test]
async fn a_response_arriving_after_cancel_is_discarded() {
    let harness = Harness::start(fast_config(1));
    let gate = Arc::new(Notify::new());
    harness.generation.script("A", Script::Gate(Arc::clone(&gate)));

    let a = harness.enqueue(input_with_keywords("A"));
    eventually("generation call in flight", || async {
        harness.generation.call_count() == 1
    })
    .await;

    harness.scheduler.cancel(&a).unwrap();
    gate.notify_one();

    let session = wait_for_status(&harness.store, &a, SessionStatus::Cancelled).await;
    assert!(session.error.is_none());
    assert!(session.result.is_none(), "partial result discarded");
    harness.shutdown().await;
}

#[tokio::test]
async fn the_next_pending_session_runs_after_a_cancellation() {
    let harness = Harness::start(fast_config(1));
    harness.generation.script("A", Script::Hang);

    let a = harness.enqueue(input_with_keywords("A"));
    let b = harness.enqueue(input_with_keywords("B"));
    wait_for_status(&harness.store, &a, SessionStatus::Generating).await;

    harness.scheduler.cancel(&a).unwrap();
    wait_for_status(&harness.store, &a, SessionStatus::Cancelled).await;
    wait_for_status(&harness.store, &b, SessionStatus::Completed).await;
    harness.shutdown().await;
}

#[tokio::test]
async fn cancel_all_leaves_no_pending_or_active_session() {
    let harness = Harness::start(fast_config(2));
    for product in ["A", "B", "C", "D"] {
        harness.generation.script(product, Script::Hang);
    }
    let ids: Vec<String> = ["A", "B", "C", "D"]
        .into_iter()
        .map(|p| harness.enqueue(input_with_keywords(p)))
        .collect();
    eventually("two sessions active", || async {
        harness.scheduler.queue_status().active == 2
    })
    .await;

    let summary = harness.scheduler.cancel_all();
    assert_eq!(summary.cancelled_pending, 2);
    assert_eq!(summary.signalled_active, 2);

    for id in &ids {
        wait_for_status(&harness.store, id, SessionStatus::Cancelled).await;
    }
    let status = harness.scheduler.queue_status();
    assert_eq!((status.pending, status.active), (0, 0));
    assert_eq!(harness.generation.call_count(), 2);
    harness.shutdown().await;
}

#[tokio::test]
async fn cancelling_settled_or_unknown_sessions() {
    let harness = Harness::start(fast_config(1));
    let a = harness.enqueue(input_with_keywords("A"));
    wait_for_status(&harness.store, &a, SessionStatus::Completed).await;

    assert_eq!(
        harness.scheduler.cancel(&a).unwrap(),
        CancelOutcome::AlreadySettled
    );
    assert_eq!(
        harness.store.get(&a).unwrap().status,
        SessionStatus::Completed,
        "terminal status is never left"
    );
    assert!(matches!(
        harness.scheduler.cancel("missing"),
        Err(AppError::NotFound(_))
    ));
    harness.shutdown().await;
}
