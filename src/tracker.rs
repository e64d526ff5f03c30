//! Document lifecycle tracker: the client-side state machine.
//!
//! [`DocumentTracker`] owns the single active document/artifacts pair and
//! drives it from submission through polling to a terminal state:
//!
//! ```text
//! Idle ──submit──▶ Tracking ──status=completed──▶ Completed (+ artifacts)
//!   ▲                 │
//!   │                 └──status=failed─────────▶ Failed
//!   └── any state: a new submit supersedes, cancelling the old poll
//! ```
//!
//! ## Polling
//!
//! While the status is `pending` or `processing` the tracker re-polls at a
//! fixed cadence ([`crate::config::DEFAULT_POLL_INTERVAL_MS`]). Polling is
//! level-triggered: there is no retry cap, no backoff, and no job timeout —
//! a persistently slow job polls forever. A poll that fails at the
//! transport level is logged and retried on the next tick; it never
//! changes the lifecycle state.
//!
//! ## Supersession
//!
//! Each submit bumps a generation counter and aborts the previous poll
//! task before anything about the new upload becomes visible
//! (cancel-before-create). Every response — poll, submit, or artifact
//! fetch — re-checks the generation on arrival and is dropped
//! unconditionally if a newer upload has been adopted in the meantime, so
//! a stale response can never overwrite a newer document's state.
//!
//! ## Artifacts
//!
//! Exactly one artifact fetch is issued per document reaching `completed`,
//! guarded by an issued flag. The fetch retries with exponential backoff
//! (same profile as the submit-side HTTP defaults: 500 ms doubling, 3
//! retries); after exhaustion the tracker stays `Completed` with
//! `artifact_error` set, and [`refetch_artifacts`](DocumentTracker::refetch_artifacts)
//! is the manual-retry affordance.

use crate::config::ClientConfig;
use crate::document::{Artifacts, Document, DocumentStatus};
use crate::error::TrackerError;
use crate::events::{EventCallback, NoopTrackerEvents};
use crate::transport::{DocumentTransport, HttpTransport};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Lifecycle phase of the tracked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerPhase {
    /// No active document.
    #[default]
    Idle,
    /// A document is being polled (`pending` or `processing`).
    Tracking,
    /// The job completed; artifacts are attached, in flight, or errored.
    Completed,
    /// The job failed. Terminal.
    Failed,
}

/// Point-in-time view of the tracker, published to all readers.
#[derive(Debug, Clone, Default)]
pub struct TrackerSnapshot {
    pub phase: TrackerPhase,
    /// The active document record, replaced wholesale by each poll result.
    pub document: Option<Document>,
    /// Attached artifacts; `Some` only in `Completed` and immutable
    /// thereafter.
    pub artifacts: Option<Artifacts>,
    /// Set when the artifact fetch exhausted its retries. Distinct from a
    /// job failure — the analysis itself succeeded.
    pub artifact_error: Option<String>,
}

impl TrackerSnapshot {
    /// True once nothing more will happen without caller intervention:
    /// the job failed, or it completed and the artifact fetch has either
    /// delivered or given up.
    pub fn is_settled(&self) -> bool {
        match self.phase {
            TrackerPhase::Failed => true,
            TrackerPhase::Completed => {
                self.artifacts.is_some() || self.artifact_error.is_some()
            }
            _ => false,
        }
    }
}

#[derive(Default)]
struct TrackerState {
    phase: TrackerPhase,
    document: Option<Document>,
    artifacts: Option<Artifacts>,
    artifact_error: Option<String>,
    artifact_fetch_issued: bool,
}

/// State shared between the tracker handle and its background task.
struct Shared {
    state: Mutex<TrackerState>,
    updates: watch::Sender<TrackerSnapshot>,
    generation: AtomicU64,
}

impl Shared {
    fn publish(&self) {
        let snapshot = {
            let st = self.state.lock().unwrap();
            TrackerSnapshot {
                phase: st.phase,
                document: st.document.clone(),
                artifacts: st.artifacts.clone(),
                artifact_error: st.artifact_error.clone(),
            }
        };
        self.updates.send_replace(snapshot);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}

/// Tracks one document at a time from submission to settled artifacts.
///
/// Single writer (the tracker and its poll task), arbitrarily many
/// readers via [`snapshot`](DocumentTracker::snapshot),
/// [`subscribe`](DocumentTracker::subscribe) or
/// [`updates`](DocumentTracker::updates). Dropping the tracker aborts the
/// background poll task.
pub struct DocumentTracker {
    transport: Arc<dyn DocumentTransport>,
    config: ClientConfig,
    events: EventCallback,
    shared: Arc<Shared>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl DocumentTracker {
    /// Create a tracker talking HTTP to the service in `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self, TrackerError> {
        let transport = HttpTransport::new(&config)
            .map_err(|e| TrackerError::Internal(format!("transport setup failed: {e}")))?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a tracker over any transport implementation.
    ///
    /// This is the injection point tests use to script the service's
    /// responses without a network.
    pub fn with_transport(transport: Arc<dyn DocumentTransport>, config: ClientConfig) -> Self {
        let (updates, _) = watch::channel(TrackerSnapshot::default());
        let events = config
            .events
            .clone()
            .unwrap_or_else(|| Arc::new(NoopTrackerEvents));
        Self {
            transport,
            config,
            events,
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState::default()),
                updates,
                generation: AtomicU64::new(0),
            }),
            poll_task: Mutex::new(None),
        }
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Read a local file and submit it for analysis.
    pub async fn submit_path(&self, path: impl AsRef<Path>) -> Result<Document, TrackerError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TrackerError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => TrackerError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => TrackerError::Internal(format!("failed to read '{}': {e}", path.display())),
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        self.submit_bytes(&filename, bytes).await
    }

    /// Submit in-memory file bytes for analysis.
    ///
    /// Supersedes any previously tracked document: the old poll task is
    /// aborted and the old document/artifacts pair discarded before the
    /// upload is issued. On upload failure the tracker is left in `Idle`.
    ///
    /// If another submit wins a race while this one's upload is in
    /// flight, this one's response is still returned to its caller but is
    /// not adopted — responses are keyed by generation, not arrival time.
    pub async fn submit_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Document, TrackerError> {
        // Cancel-before-create: no two poll tasks may observe themselves
        // as current, even transiently.
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.poll_task.lock().unwrap().take() {
            task.abort();
        }
        {
            let mut st = self.shared.state.lock().unwrap();
            *st = TrackerState::default();
        }
        self.shared.publish();

        info!("submitting '{}' ({} bytes)", filename, bytes.len());
        let document = self
            .transport
            .submit(filename, bytes)
            .await
            .map_err(|source| {
                warn!("submit of '{}' failed: {}", filename, source);
                TrackerError::Submit { source }
            })?;

        if self.shared.is_stale(generation) {
            debug!(
                "submit response for '{}' arrived after supersession, not adopted",
                document.id
            );
            return Ok(document);
        }

        self.adopt(generation, document.clone());
        Ok(document)
    }

    /// Adopt a freshly submitted document and start whatever work its
    /// initial status calls for.
    fn adopt(&self, generation: u64, document: Document) {
        {
            let mut st = self.shared.state.lock().unwrap();
            st.phase = match document.status {
                DocumentStatus::Completed => TrackerPhase::Completed,
                DocumentStatus::Failed => TrackerPhase::Failed,
                _ => TrackerPhase::Tracking,
            };
            st.document = Some(document.clone());
        }
        self.shared.publish();
        info!(
            "tracking document '{}' ('{}', status {})",
            document.id, document.filename, document.status
        );
        self.events.on_submitted(&document);

        match document.status {
            DocumentStatus::Failed => {
                let message = document
                    .error
                    .clone()
                    .unwrap_or_else(|| "analysis failed".to_string());
                self.events.on_failed(&document.id, &message);
            }
            DocumentStatus::Completed => {
                self.events.on_completed(&document);
                if let Some(artifacts) = document.artifacts.clone() {
                    attach_inline_artifacts(&self.shared, &self.events, generation, &document.id, artifacts);
                } else {
                    self.spawn_driver(generation, document.id.clone(), document.status);
                }
            }
            _ => self.spawn_driver(generation, document.id.clone(), document.status),
        }
    }

    fn spawn_driver(&self, generation: u64, id: String, initial_status: DocumentStatus) {
        let handle = tokio::spawn(drive(
            Arc::clone(&self.shared),
            Arc::clone(&self.transport),
            Arc::clone(&self.events),
            self.config.clone(),
            generation,
            id,
            initial_status,
        ));
        *self.poll_task.lock().unwrap() = Some(handle);
    }

    // ── Read surface ─────────────────────────────────────────────────────

    /// Current state, cloned.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.shared.updates.borrow().clone()
    }

    /// Subscribe to state changes. The receiver always holds the latest
    /// snapshot; intermediate states may be skipped under load.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.shared.updates.subscribe()
    }

    /// State changes as a `Stream`, for `StreamExt` consumers.
    pub fn updates(&self) -> WatchStream<TrackerSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Wait until the tracked document settles: job failed, or job
    /// completed and the artifact fetch delivered or gave up.
    ///
    /// There is deliberately no timeout here — a job may stay `Tracking`
    /// indefinitely. Wrap in `tokio::time::timeout` if a bound is needed.
    pub async fn wait_until_settled(&self) -> TrackerSnapshot {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.is_settled() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                // Sender gone; nothing further will arrive.
                return self.snapshot();
            }
        }
    }

    // ── Manual artifact retry ────────────────────────────────────────────

    /// Retry the artifact fetch after a previous fetch exhausted its
    /// retries. No-op (returns the attached artifacts) when they already
    /// arrived.
    pub async fn refetch_artifacts(&self) -> Result<Artifacts, TrackerError> {
        let (generation, id) = {
            let mut st = self.shared.state.lock().unwrap();
            if st.phase != TrackerPhase::Completed {
                return Err(TrackerError::Internal(
                    "no completed document to fetch artifacts for".into(),
                ));
            }
            if let Some(artifacts) = &st.artifacts {
                return Ok(artifacts.clone());
            }
            // Re-arming while the automatic fetch is still in flight would
            // break the at-most-one-fetch guarantee.
            if st.artifact_fetch_issued && st.artifact_error.is_none() {
                return Err(TrackerError::Internal(
                    "artifact fetch still in progress".into(),
                ));
            }
            let id = match st.document.as_ref() {
                Some(doc) => doc.id.clone(),
                None => return Err(TrackerError::Internal("completed phase without a document".into())),
            };
            // Re-arm the exactly-once guard for this manual attempt.
            st.artifact_fetch_issued = false;
            st.artifact_error = None;
            (self.shared.generation.load(Ordering::SeqCst), id)
        };

        fetch_artifacts(
            &self.shared,
            &self.transport,
            &self.events,
            &self.config,
            generation,
            &id,
        )
        .await;

        let st = self.shared.state.lock().unwrap();
        match &st.artifacts {
            Some(artifacts) => Ok(artifacts.clone()),
            None => Err(TrackerError::ArtifactFetch {
                id,
                retries: self.config.artifact_max_retries,
                detail: st
                    .artifact_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

impl Drop for DocumentTracker {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

// ── Background driver ────────────────────────────────────────────────────

/// Poll until a terminal status, then (on `completed`) fetch artifacts.
///
/// Runs as the tracker's single background task for one generation.
/// Returns silently the moment its generation is superseded.
async fn drive(
    shared: Arc<Shared>,
    transport: Arc<dyn DocumentTransport>,
    events: EventCallback,
    config: ClientConfig,
    generation: u64,
    id: String,
    initial_status: DocumentStatus,
) {
    let mut status = initial_status;

    while !status.is_terminal() {
        sleep(Duration::from_millis(config.poll_interval_ms)).await;
        if shared.is_stale(generation) {
            return;
        }

        match transport.get_status(&id).await {
            Err(e) => {
                if shared.is_stale(generation) {
                    return;
                }
                // Transient. Swallowed and retried on the next tick; only
                // an explicit `failed` status from the service ends
                // tracking.
                warn!("status poll for '{}' failed, retrying next tick: {}", id, e);
                events.on_poll_error(&id, &e.to_string());
            }
            Ok(document) => {
                {
                    let mut st = shared.state.lock().unwrap();
                    if shared.is_stale(generation) {
                        return;
                    }
                    status = document.status;
                    st.phase = match status {
                        DocumentStatus::Completed => TrackerPhase::Completed,
                        DocumentStatus::Failed => TrackerPhase::Failed,
                        _ => TrackerPhase::Tracking,
                    };
                    st.document = Some(document.clone());
                }
                shared.publish();
                debug!("document '{}' status: {}", id, status);
                events.on_status(&document);

                match status {
                    DocumentStatus::Failed => {
                        let message = document
                            .error
                            .clone()
                            .unwrap_or_else(|| "analysis failed".to_string());
                        info!("document '{}' failed: {}", id, message);
                        events.on_failed(&id, &message);
                        return;
                    }
                    DocumentStatus::Completed => {
                        info!("document '{}' completed", id);
                        events.on_completed(&document);
                        if let Some(artifacts) = document.artifacts.clone() {
                            attach_inline_artifacts(&shared, &events, generation, &id, artifacts);
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if status == DocumentStatus::Completed {
        fetch_artifacts(&shared, &transport, &events, &config, generation, &id).await;
    }
}

/// The service sometimes inlines artifacts on an already-completed record;
/// adopt them directly and mark the fetch as issued so no duplicate
/// request goes out.
fn attach_inline_artifacts(
    shared: &Shared,
    events: &EventCallback,
    generation: u64,
    id: &str,
    artifacts: Artifacts,
) {
    {
        let mut st = shared.state.lock().unwrap();
        if shared.is_stale(generation) || st.artifact_fetch_issued {
            return;
        }
        st.artifact_fetch_issued = true;
        st.artifacts = Some(artifacts);
    }
    shared.publish();
    debug!("adopted inline artifacts for '{}'", id);
    events.on_artifacts_ready(id);
}

/// Issue the one artifact fetch for a completed document, with bounded
/// exponential backoff. On exhaustion the phase stays `Completed` and the
/// failure is recorded as `artifact_error`.
async fn fetch_artifacts(
    shared: &Shared,
    transport: &Arc<dyn DocumentTransport>,
    events: &EventCallback,
    config: &ClientConfig,
    generation: u64,
    id: &str,
) {
    {
        let mut st = shared.state.lock().unwrap();
        if shared.is_stale(generation) {
            return;
        }
        if st.artifact_fetch_issued {
            debug!("artifact fetch for '{}' already issued, skipping", id);
            return;
        }
        st.artifact_fetch_issued = true;
    }

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.artifact_max_retries {
        if attempt > 0 {
            let backoff = config.artifact_retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "artifact fetch for '{}': retry {}/{} after {}ms",
                id, attempt, config.artifact_max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        if shared.is_stale(generation) {
            return;
        }

        match transport.get_artifacts(id).await {
            Ok(artifacts) => {
                {
                    let mut st = shared.state.lock().unwrap();
                    if shared.is_stale(generation) {
                        return;
                    }
                    st.artifacts = Some(artifacts);
                    st.artifact_error = None;
                }
                shared.publish();
                info!("artifacts ready for '{}'", id);
                events.on_artifacts_ready(id);
                return;
            }
            Err(e) => {
                warn!("artifact fetch for '{}' attempt {} failed: {}", id, attempt + 1, e);
                last_err = Some(e.to_string());
            }
        }
    }

    let detail = last_err.unwrap_or_else(|| "unknown error".to_string());
    {
        let mut st = shared.state.lock().unwrap();
        if shared.is_stale(generation) {
            return;
        }
        st.artifact_error = Some(detail.clone());
    }
    shared.publish();
    warn!(
        "artifacts for '{}' unavailable after {} retries: {}",
        id, config.artifact_max_retries, detail
    );
    events.on_artifact_fetch_failed(id, config.artifact_max_retries, &detail);
}
