//! Integration tests for the document lifecycle tracker.
//!
//! The tracker is driven through a scripted in-memory transport injected
//! at the `DocumentTransport` seam, so every service behaviour — slow
//! jobs, transport blips, failed analyses, flaky artifact endpoints — is
//! reproduced deterministically without a network. Poll cadence and
//! backoff are shrunk to a few milliseconds to keep the suite fast.
//!
//! A live smoke test against a real service is gated behind the
//! `PAPERHELPER_E2E` environment variable:
//!   PAPERHELPER_E2E=1 cargo test --test tracker live_ -- --nocapture

use async_trait::async_trait;
use futures::StreamExt;
use paperhelper_client::{
    Artifacts, ClientConfig, Document, DocumentStatus, DocumentTracker, DocumentTransport,
    TrackerError, TrackerEvents, TrackerPhase, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn doc(id: &str, status: DocumentStatus) -> Document {
    Document {
        id: id.into(),
        filename: format!("{id}.pdf"),
        status,
        error: None,
        metadata: HashMap::new(),
        artifacts: None,
    }
}

fn failed_doc(id: &str, message: &str) -> Document {
    let mut d = doc(id, DocumentStatus::Failed);
    d.error = Some(message.into());
    d
}

fn sample_artifacts() -> Artifacts {
    serde_json::from_value(serde_json::json!({
        "summary": "The paper introduces the transformer architecture.",
        "mind_map": {
            "nodes": [
                {"id": "n1", "label": "Attention", "weight": 2.0},
                {"id": "n2", "label": "Encoder", "weight": 1.0}
            ],
            "edges": [{"source": "n1", "target": "n2", "weight": 0.8}]
        },
        "glossary": [
            {"term": "softmax", "definition": "normalised exponential", "score": 0.9, "references": []}
        ]
    }))
    .expect("sample artifacts json")
}

fn fast_config() -> ClientConfig {
    ClientConfig::builder()
        .poll_interval_ms(5)
        .artifact_retry_backoff_ms(1)
        .build()
        .expect("config")
}

fn transient_error() -> TransportError {
    TransportError::Network {
        url: "http://localhost:8000/api/documents/x".into(),
        reason: "connection reset".into(),
    }
}

/// One scripted outcome for a submit or status call.
enum Step {
    Report(Document),
    Fail,
}

/// In-memory service double: scripted responses plus call accounting.
#[derive(Default)]
struct ScriptedTransport {
    submits: Mutex<VecDeque<Step>>,
    /// Per-id status script; when exhausted, the last reported document
    /// is repeated (a real service keeps answering with the same record).
    statuses: Mutex<HashMap<String, VecDeque<Step>>>,
    last_status: Mutex<HashMap<String, Document>>,
    artifacts: Mutex<HashMap<String, Artifacts>>,
    /// Number of artifact calls per id that fail before one succeeds.
    artifact_failures: Mutex<HashMap<String, usize>>,
    /// Artificial latency for submits, keyed by filename.
    submit_delays: Mutex<HashMap<String, Duration>>,
    status_calls: AtomicUsize,
    artifact_calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script_submit(&self, step: Step) {
        self.submits.lock().unwrap().push_back(step);
    }

    fn script_status(&self, id: &str, steps: Vec<Step>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .extend(steps);
    }

    fn put_artifacts(&self, id: &str, artifacts: Artifacts) {
        self.artifacts.lock().unwrap().insert(id.into(), artifacts);
    }

    fn fail_artifacts_times(&self, id: &str, times: usize) {
        self.artifact_failures
            .lock()
            .unwrap()
            .insert(id.into(), times);
    }

    fn delay_submit(&self, filename: &str, delay: Duration) {
        self.submit_delays
            .lock()
            .unwrap()
            .insert(filename.into(), delay);
    }

    fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn artifact_call_count(&self) -> usize {
        self.artifact_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentTransport for ScriptedTransport {
    async fn submit(&self, filename: &str, _bytes: Vec<u8>) -> Result<Document, TransportError> {
        let delay = self.submit_delays.lock().unwrap().get(filename).copied();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let step = self.submits.lock().unwrap().pop_front();
        match step {
            Some(Step::Report(d)) => Ok(d),
            Some(Step::Fail) => Err(TransportError::Status {
                status: 500,
                endpoint: "/api/documents".into(),
                body: "upload rejected".into(),
            }),
            None => Err(TransportError::Internal("unscripted submit".into())),
        }
    }

    async fn get_status(&self, id: &str) -> Result<Document, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|q| q.pop_front());
        match step {
            Some(Step::Report(d)) => {
                self.last_status.lock().unwrap().insert(id.into(), d.clone());
                Ok(d)
            }
            Some(Step::Fail) => Err(transient_error()),
            None => self
                .last_status
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(TransportError::NotFound { id: id.into() }),
        }
    }

    async fn get_artifacts(&self, id: &str) -> Result<Artifacts, TransportError> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.artifact_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError::Status {
                        status: 503,
                        endpoint: format!("/api/documents/{id}/mindmap"),
                        body: "warming up".into(),
                    });
                }
            }
        }
        self.artifacts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(TransportError::NotFound { id: id.into() })
    }
}

/// Event recorder for assertions on callback delivery.
#[derive(Default)]
struct RecordingEvents {
    statuses: AtomicUsize,
    poll_errors: AtomicUsize,
    failures: Mutex<Vec<String>>,
    artifact_fetch_failures: AtomicUsize,
    artifacts_ready: AtomicUsize,
}

impl TrackerEvents for RecordingEvents {
    fn on_status(&self, _document: &Document) {
        self.statuses.fetch_add(1, Ordering::SeqCst);
    }
    fn on_poll_error(&self, _id: &str, _error: &str) {
        self.poll_errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_failed(&self, _id: &str, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
    fn on_artifact_fetch_failed(&self, _id: &str, _retries: u32, _error: &str) {
        self.artifact_fetch_failures.fetch_add(1, Ordering::SeqCst);
    }
    fn on_artifacts_ready(&self, _id: &str) {
        self.artifacts_ready.fetch_add(1, Ordering::SeqCst);
    }
}

async fn settle(tracker: &DocumentTracker) -> paperhelper_client::TrackerSnapshot {
    timeout(Duration::from_secs(5), tracker.wait_until_settled())
        .await
        .expect("tracker should settle within 5s")
}

// ── Completed path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_job_fetches_artifacts_exactly_once_and_stops_polling() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc1", DocumentStatus::Pending)));
    transport.script_status(
        "doc1",
        vec![
            Step::Report(doc("doc1", DocumentStatus::Processing)),
            Step::Report(doc("doc1", DocumentStatus::Completed)),
        ],
    );
    transport.put_artifacts("doc1", sample_artifacts());

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    let submitted = tracker.submit_bytes("paper.pdf", b"%PDF".to_vec()).await.unwrap();
    assert_eq!(submitted.status, DocumentStatus::Pending);

    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.phase, TrackerPhase::Completed);
    let artifacts = snapshot.artifacts.expect("artifacts attached");
    assert_eq!(artifacts.mind_map.nodes.len(), 2);
    assert_eq!(transport.artifact_call_count(), 1);

    // Polling ceased at the terminal status: no further ticks fire.
    let polls_at_settle = transport.status_call_count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.status_call_count(), polls_at_settle);
    assert_eq!(transport.artifact_call_count(), 1);
}

#[tokio::test]
async fn repeated_pending_polls_cause_no_extra_side_effects() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc1", DocumentStatus::Pending)));
    transport.script_status(
        "doc1",
        vec![
            Step::Report(doc("doc1", DocumentStatus::Pending)),
            Step::Report(doc("doc1", DocumentStatus::Pending)),
            Step::Report(doc("doc1", DocumentStatus::Pending)),
            Step::Report(doc("doc1", DocumentStatus::Completed)),
        ],
    );
    transport.put_artifacts("doc1", sample_artifacts());

    let events = Arc::new(RecordingEvents::default());
    let config = ClientConfig::builder()
        .poll_interval_ms(5)
        .artifact_retry_backoff_ms(1)
        .events(events.clone())
        .build()
        .unwrap();

    let tracker = DocumentTracker::with_transport(transport.clone(), config);
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.phase, TrackerPhase::Completed);
    // Each poll result is reported, unchanged statuses included, but the
    // artifact fetch fires once regardless.
    assert_eq!(events.statuses.load(Ordering::SeqCst), 4);
    assert_eq!(events.artifacts_ready.load(Ordering::SeqCst), 1);
    assert_eq!(transport.artifact_call_count(), 1);
}

#[tokio::test]
async fn inline_artifacts_on_submit_skip_the_fetch() {
    let transport = ScriptedTransport::new();
    let mut completed = doc("doc9", DocumentStatus::Completed);
    completed.artifacts = Some(sample_artifacts());
    transport.script_submit(Step::Report(completed));

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.phase, TrackerPhase::Completed);
    assert!(snapshot.artifacts.is_some());
    assert_eq!(transport.artifact_call_count(), 0);
    assert_eq!(transport.status_call_count(), 0);
}

#[tokio::test]
async fn updates_stream_yields_snapshots_until_settled() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc8", DocumentStatus::Pending)));
    transport.script_status(
        "doc8",
        vec![
            Step::Report(doc("doc8", DocumentStatus::Processing)),
            Step::Report(doc("doc8", DocumentStatus::Completed)),
        ],
    );
    transport.put_artifacts("doc8", sample_artifacts());

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    let mut stream = tracker.updates();
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let mut seen_tracking = false;
    let settled = loop {
        let snapshot = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stream should progress")
            .expect("sender alive while tracker exists");
        if snapshot.phase == TrackerPhase::Tracking {
            seen_tracking = true;
        }
        if snapshot.is_settled() {
            break snapshot;
        }
    };
    assert!(seen_tracking, "stream should surface the tracking phase");
    assert_eq!(settled.phase, TrackerPhase::Completed);
    assert!(settled.artifacts.is_some());
}

// ── Failed path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_job_surfaces_error_and_never_fetches_artifacts() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc2", DocumentStatus::Pending)));
    transport.script_status("doc2", vec![Step::Report(failed_doc("doc2", "corrupt file"))]);

    let events = Arc::new(RecordingEvents::default());
    let config = ClientConfig::builder()
        .poll_interval_ms(5)
        .events(events.clone())
        .build()
        .unwrap();

    let tracker = DocumentTracker::with_transport(transport.clone(), config);
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.phase, TrackerPhase::Failed);
    assert_eq!(
        snapshot.document.unwrap().error.as_deref(),
        Some("corrupt file")
    );
    assert_eq!(transport.artifact_call_count(), 0);
    assert_eq!(events.failures.lock().unwrap().as_slice(), ["corrupt file"]);

    let polls_at_settle = transport.status_call_count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.status_call_count(), polls_at_settle);
}

// ── Transient poll faults ────────────────────────────────────────────────────

#[tokio::test]
async fn transient_poll_error_is_swallowed_and_polling_continues() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc3", DocumentStatus::Pending)));
    transport.script_status(
        "doc3",
        vec![
            Step::Fail,
            Step::Report(doc("doc3", DocumentStatus::Processing)),
            Step::Report(doc("doc3", DocumentStatus::Completed)),
        ],
    );
    transport.put_artifacts("doc3", sample_artifacts());

    let events = Arc::new(RecordingEvents::default());
    let config = ClientConfig::builder()
        .poll_interval_ms(5)
        .artifact_retry_backoff_ms(1)
        .events(events.clone())
        .build()
        .unwrap();

    let tracker = DocumentTracker::with_transport(transport.clone(), config);
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let snapshot = settle(&tracker).await;
    // The blip was never a lifecycle event: no Failed phase, job completed.
    assert_eq!(snapshot.phase, TrackerPhase::Completed);
    assert_eq!(events.poll_errors.load(Ordering::SeqCst), 1);
    assert!(events.failures.lock().unwrap().is_empty());
}

// ── Supersession ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn stale_submit_response_does_not_displace_newer_document() {
    let transport = ScriptedTransport::new();
    // a.pdf's upload is slow; b.pdf is submitted while it is in flight.
    transport.delay_submit("a.pdf", Duration::from_millis(100));
    transport.script_submit(Step::Report(doc("docA", DocumentStatus::Completed)));
    transport.script_submit(Step::Report(doc("docB", DocumentStatus::Pending)));
    transport.script_status("docB", vec![Step::Report(doc("docB", DocumentStatus::Processing))]);

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());

    let (first, second) = tokio::join!(tracker.submit_bytes("a.pdf", vec![1]), async {
        sleep(Duration::from_millis(20)).await;
        tracker.submit_bytes("b.pdf", vec![2]).await
    });

    // The superseded submit still hands its caller the response…
    assert_eq!(first.unwrap().id, "docA");
    assert_eq!(second.unwrap().id, "docB");

    // …but the tracker stays keyed to docB: docA was never adopted, never
    // polled, and its completed status triggered no artifact fetch.
    sleep(Duration::from_millis(30)).await;
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.document.as_ref().map(|d| d.id.as_str()), Some("docB"));
    assert_eq!(snapshot.phase, TrackerPhase::Tracking);
    assert_eq!(transport.artifact_call_count(), 0);
}

#[tokio::test]
async fn new_upload_cancels_previous_polling() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("docA", DocumentStatus::Pending)));
    transport.script_submit(Step::Report(doc("docB", DocumentStatus::Pending)));
    // docA never terminates; docB completes.
    transport.script_status("docA", vec![Step::Report(doc("docA", DocumentStatus::Processing))]);
    transport.script_status(
        "docB",
        vec![Step::Report(doc("docB", DocumentStatus::Completed))],
    );
    transport.put_artifacts("docB", sample_artifacts());

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    tracker.submit_bytes("a.pdf", vec![1]).await.unwrap();
    sleep(Duration::from_millis(12)).await;

    tracker.submit_bytes("b.pdf", vec![2]).await.unwrap();
    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.document.as_ref().map(|d| d.id.as_str()), Some("docB"));
    assert!(snapshot.artifacts.is_some());

    // docA's cadence is dead: its poll count no longer moves.
    let docb_settled_polls = transport.status_call_count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.status_call_count(), docb_settled_polls);
}

#[tokio::test]
async fn dropping_the_tracker_stops_polling() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc5", DocumentStatus::Pending)));
    transport.script_status("doc5", vec![Step::Report(doc("doc5", DocumentStatus::Processing))]);

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();
    sleep(Duration::from_millis(25)).await;
    assert!(transport.status_call_count() > 0);

    drop(tracker);
    let calls = transport.status_call_count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.status_call_count(), calls);
}

// ── Submit failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_upload_leaves_tracker_idle() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Fail);

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    let err = tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap_err();
    assert!(matches!(err, TrackerError::Submit { .. }));

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.phase, TrackerPhase::Idle);
    assert!(snapshot.document.is_none());
}

#[tokio::test]
async fn rejected_upload_discards_previously_tracked_document() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("docA", DocumentStatus::Pending)));
    transport.script_submit(Step::Fail);
    transport.script_status("docA", vec![Step::Report(doc("docA", DocumentStatus::Processing))]);

    let tracker = DocumentTracker::with_transport(transport.clone(), fast_config());
    tracker.submit_bytes("a.pdf", vec![1]).await.unwrap();
    sleep(Duration::from_millis(12)).await;

    let err = tracker.submit_bytes("b.pdf", vec![2]).await.unwrap_err();
    assert!(matches!(err, TrackerError::Submit { .. }));
    // The restart discarded docA; a failed re-upload returns to Idle.
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.phase, TrackerPhase::Idle);
    assert!(snapshot.document.is_none());
}

// ── Artifact fetch failures ──────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_artifact_fetch_keeps_completed_phase_with_error() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc6", DocumentStatus::Completed)));
    transport.put_artifacts("doc6", sample_artifacts());
    transport.fail_artifacts_times("doc6", 100);

    let events = Arc::new(RecordingEvents::default());
    let config = ClientConfig::builder()
        .poll_interval_ms(5)
        .artifact_max_retries(2)
        .artifact_retry_backoff_ms(1)
        .events(events.clone())
        .build()
        .unwrap();

    let tracker = DocumentTracker::with_transport(transport.clone(), config);
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();

    let snapshot = settle(&tracker).await;
    assert_eq!(snapshot.phase, TrackerPhase::Completed, "job itself succeeded");
    assert!(snapshot.artifacts.is_none());
    let detail = snapshot.artifact_error.expect("artifact error recorded");
    assert!(detail.contains("503"), "got: {detail}");
    // Initial attempt + 2 retries.
    assert_eq!(transport.artifact_call_count(), 3);
    assert_eq!(events.artifact_fetch_failures.load(Ordering::SeqCst), 1);
    assert!(events.failures.lock().unwrap().is_empty(), "not a job failure");
}

#[tokio::test]
async fn manual_refetch_recovers_artifacts() {
    let transport = ScriptedTransport::new();
    transport.script_submit(Step::Report(doc("doc7", DocumentStatus::Completed)));
    transport.put_artifacts("doc7", sample_artifacts());
    // The automatic fetch (1 attempt + 1 retry) fails; the manual refetch
    // succeeds on its first attempt.
    transport.fail_artifacts_times("doc7", 2);

    let config = ClientConfig::builder()
        .poll_interval_ms(5)
        .artifact_max_retries(1)
        .artifact_retry_backoff_ms(1)
        .build()
        .unwrap();

    let tracker = DocumentTracker::with_transport(transport.clone(), config);
    tracker.submit_bytes("paper.pdf", vec![1]).await.unwrap();
    let snapshot = settle(&tracker).await;
    assert!(snapshot.artifacts.is_none());

    let artifacts = tracker.refetch_artifacts().await.expect("manual retry succeeds");
    assert_eq!(artifacts.glossary.len(), 1);

    let snapshot = tracker.snapshot();
    assert!(snapshot.artifacts.is_some());
    assert!(snapshot.artifact_error.is_none());
}

// ── Live smoke test (opt-in) ─────────────────────────────────────────────────

#[tokio::test]
async fn live_analyze_round_trip() {
    if std::env::var("PAPERHELPER_E2E").is_err() {
        println!("SKIP — set PAPERHELPER_E2E=1 (and a running service) to run");
        return;
    }

    let config = ClientConfig::from_env();
    let tracker = DocumentTracker::new(config).expect("tracker");
    tracker
        .submit_bytes("smoke.txt", b"A tiny plain-text paper about attention.".to_vec())
        .await
        .expect("submit against live service");

    let snapshot = timeout(Duration::from_secs(120), tracker.wait_until_settled())
        .await
        .expect("live job should settle within 2 minutes");
    println!("live result: {:?} ({:?})", snapshot.phase, snapshot.artifact_error);
    assert!(snapshot.is_settled());
}
