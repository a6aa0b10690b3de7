//! Integration tests for the persistence bridge after a successful generation.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing_subscriber::fmt;

use metagen_queue::models::session::SessionStatus;
use metagen_queue::AppError;

use super::test_helpers::{
    eventually, fast_config, input_with_keywords, wait_for_status, Harness, Script,
};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn successful_persistence_records_the_draft_id() {
    let harness = Harness::start(fast_config(1));
    let a = harness.enqueue(input_with_keywords("A"));

    wait_for_status(&harness.store, &a, SessionStatus::Completed).await;
    eventually("draft id recorded", || async {
        harness.store.get(&a).unwrap().draft_id.is_some()
    })
    .await;

    assert_eq!(
        harness.store.get(&a).unwrap().draft_id.as_deref(),
        Some("draft-id-A")
    );
    assert_eq!(harness.persistence.calls(), vec!["A"]);
    harness.shutdown().await;
}

#[tokio::test]
async fn persistence_failure_keeps_the_session_completed_and_is_logged() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let harness = Harness::start(fast_config(1));
    harness.persistence.script(
        "A",
        Script::Fail(AppError::Persistence("drafts table is read-only".into())),
    );

    let a = harness.enqueue(input_with_keywords("A"));
    let b = harness.enqueue(input_with_keywords("B"));
    wait_for_status(&harness.store, &b, SessionStatus::Completed).await;

    let session = harness.store.get(&a).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.result.is_some());
    assert!(session.error.is_none());
    assert!(session.draft_id.is_none());

    let text = logs.text();
    assert!(text.contains("draft persistence failed"), "log was: {text}");
    assert!(text.contains("drafts table is read-only"), "log was: {text}");
    assert!(text.contains(&a), "log names the session: {text}");
    harness.shutdown().await;
}

#[tokio::test]
async fn slot_is_held_until_persistence_finishes() {
    let harness = Harness::start(fast_config(1));
    let gate = Arc::new(Notify::new());
    harness.persistence.script("A", Script::Gate(Arc::clone(&gate)));

    let a = harness.enqueue(input_with_keywords("A"));
    let b = harness.enqueue(input_with_keywords("B"));
    wait_for_status(&harness.store, &a, SessionStatus::Completed).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.store.get(&b).unwrap().status, SessionStatus::Pending);

    gate.notify_one();
    wait_for_status(&harness.store, &b, SessionStatus::Completed).await;
    harness.shutdown().await;
}

#[tokio::test]
async fn persistence_deadline_does_not_fail_the_session() {
    let mut config = fast_config(1);
    config.persistence_timeout = Duration::from_millis(50);
    let harness = Harness::start(config);
    harness.persistence.script("A", Script::Hang);

    let a = harness.enqueue(input_with_keywords("A"));
    let b = harness.enqueue(input_with_keywords("B"));
    wait_for_status(&harness.store, &b, SessionStatus::Completed).await;

    let session = harness.store.get(&a).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.draft_id.is_none());
    harness.shutdown().await;
}
