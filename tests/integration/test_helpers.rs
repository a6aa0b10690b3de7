//! Shared helpers for integration tests: scripted collaborator fakes and
//! a scheduler harness wired to them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};

use metagen_queue::models::input::GenerationInput;
use metagen_queue::models::keyword::Keyword;
use metagen_queue::models::session::{GenerationSession, SessionStatus};
use metagen_queue::orchestrator::{Collaborators, QueueScheduler, SchedulerConfig, SchedulerHandle};
use metagen_queue::pipeline::wire::{
    DraftRequest, DraftResponse, GeneratedContent, GenerationRequest, GenerationResponse,
    GroundingRequest, GroundingResponse, ResponseMetadata, ScorePayload, UspExtraction,
};
use metagen_queue::pipeline::{
    GenerationService, GroundingService, PersistenceService, ServiceFuture,
};
use metagen_queue::store::{QueueEvent, SessionStore};
use metagen_queue::{AppError, Result};

/// How a fake answers a call.
#[derive(Clone)]
pub enum Script {
    /// Answer immediately.
    Succeed,
    /// Answer after a delay.
    Delay(Duration),
    /// Return the given error.
    Fail(AppError),
    /// Never answer.
    Hang,
    /// Answer once the gate is notified.
    Gate(Arc<Notify>),
}

async fn play(script: Script) -> Result<()> {
    match script {
        Script::Succeed => Ok(()),
        Script::Delay(after) => {
            tokio::time::sleep(after).await;
            Ok(())
        }
        Script::Fail(err) => Err(err),
        Script::Hang => std::future::pending().await,
        Script::Gate(gate) => {
            gate.notified().await;
            Ok(())
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted fake for all three collaborator seams, keyed by product name.
#[derive(Default)]
pub struct FakeService {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    scripts: Mutex<HashMap<String, Script>>,
    keywords: Vec<Keyword>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_keywords(terms: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            keywords: terms.iter().map(|t| Keyword::selected(*t)).collect(),
            ..Self::default()
        })
    }

    /// Script the answer for one product.
    pub fn script(&self, product: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(product.to_owned(), script);
    }

    /// Products called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of simultaneously outstanding calls.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn call(&self, product: &str) -> Result<()> {
        self.calls.lock().unwrap().push(product.to_owned());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(product)
            .cloned()
            .unwrap_or(Script::Succeed);
        play(script).await
    }
}

impl GroundingService for FakeService {
    fn ground(&self, request: GroundingRequest) -> ServiceFuture<'_, GroundingResponse> {
        Box::pin(async move {
            self.call(&request.product_name).await?;
            Ok(GroundingResponse {
                keywords: self.keywords.clone(),
            })
        })
    }
}

impl GenerationService for FakeService {
    fn generate(&self, request: GenerationRequest) -> ServiceFuture<'_, GenerationResponse> {
        Box::pin(async move {
            self.call(&request.product_name).await?;
            Ok(sample_response(&request.product_name))
        })
    }
}

impl PersistenceService for FakeService {
    fn save_draft(&self, request: DraftRequest) -> ServiceFuture<'_, DraftResponse> {
        Box::pin(async move {
            self.call(&request.input.product_name).await?;
            Ok(DraftResponse {
                id: format!("draft-{}", request.input.product_id),
            })
        })
    }
}

/// A well-formed generation answer.
pub fn sample_response(product: &str) -> GenerationResponse {
    GenerationResponse {
        content: Some(GeneratedContent {
            description: Some(format!("All about the {product}.")),
            timestamps: Some("00:00 Intro\n01:30 Unboxing\n05:10 Verdict".into()),
            hashtags: vec!["review".into(), "#Gadgets".into()],
            faq: vec![metagen_queue::models::result::FaqItem {
                question: "Is it worth it?".into(),
                answer: "Yes.".into(),
            }],
        }),
        usp: Some(UspExtraction {
            points: vec!["Quiet".into()],
        }),
        score: Some(ScorePayload {
            total: 82.0,
            breakdown: [("seo".to_owned(), 40.0)].into_iter().collect(),
        }),
        metadata: Some(ResponseMetadata {
            engine: Some("fake".into()),
            model: Some("fake-1".into()),
        }),
    }
}

/// Input with pre-selected keywords, so grounding is skipped.
pub fn input_with_keywords(product: &str) -> GenerationInput {
    serde_json::from_value(serde_json::json!({
        "product_id": format!("id-{product}"),
        "product_name": product,
        "category": "kitchen",
        "transcript": format!("A long look at the {product}."),
        "selected_keywords": [{ "term": "air fryer" }],
        "fixed_hashtags": ["#Brand"]
    }))
    .unwrap()
}

/// Input without keywords, so grounding runs first.
pub fn input_without_keywords(product: &str) -> GenerationInput {
    GenerationInput {
        selected_keywords: Vec::new(),
        ..input_with_keywords(product)
    }
}

/// Short intervals so tests settle quickly.
pub fn fast_config(ceiling: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_active_sessions: ceiling,
        tick_interval: Duration::from_millis(20),
        progress_interval: Duration::from_millis(10),
        grounding_timeout: Duration::from_secs(5),
        generation_timeout: Duration::from_secs(5),
        persistence_timeout: Duration::from_secs(5),
    }
}

/// A scheduler wired to fakes, with its loop running.
pub struct Harness {
    pub scheduler: QueueScheduler,
    pub store: Arc<SessionStore>,
    pub grounding: Arc<FakeService>,
    pub generation: Arc<FakeService>,
    pub persistence: Arc<FakeService>,
    handle: Option<SchedulerHandle>,
}

impl Harness {
    pub fn start(config: SchedulerConfig) -> Self {
        let mut harness = Self::idle(config);
        harness.handle = Some(harness.scheduler.start());
        harness
    }

    /// Build without starting the loop; drive with `run_pass()`.
    pub fn idle(config: SchedulerConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let grounding = FakeService::with_keywords(&["grounded one", "grounded two"]);
        let generation = FakeService::new();
        let persistence = FakeService::new();
        let scheduler = QueueScheduler::new(
            config,
            Arc::clone(&store),
            Collaborators {
                grounding: Arc::clone(&grounding) as Arc<dyn GroundingService>,
                generation: Arc::clone(&generation) as Arc<dyn GenerationService>,
                persistence: Arc::clone(&persistence) as Arc<dyn PersistenceService>,
            },
        );
        Self {
            scheduler,
            store,
            grounding,
            generation,
            persistence,
            handle: None,
        }
    }

    pub fn enqueue(&self, input: GenerationInput) -> String {
        self.scheduler.enqueue(input).expect("valid input")
    }

    /// Stop the loop and wait for drivers.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown().await;
        }
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for a session to reach `status` and return its snapshot.
pub async fn wait_for_status(
    store: &SessionStore,
    id: &str,
    status: SessionStatus,
) -> GenerationSession {
    eventually(&format!("{id} to reach {}", status.as_str()), || async {
        store.get(id).unwrap().status == status
    })
    .await;
    store.get(id).unwrap()
}

/// Drain status changes already published on `rx` into per-session histories.
pub fn status_history(
    rx: &mut broadcast::Receiver<QueueEvent>,
) -> HashMap<String, Vec<SessionStatus>> {
    let mut history: HashMap<String, Vec<SessionStatus>> = HashMap::new();
    loop {
        match rx.try_recv() {
            Ok(QueueEvent::StatusChanged { session_id, status }) => {
                history.entry(session_id).or_default().push(status);
            }
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                panic!("event receiver lagged by {missed}");
            }
            Err(_) => break,
        }
    }
    history
}
