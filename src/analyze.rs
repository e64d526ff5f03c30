//! Eager (submit-and-wait) entry points.
//!
//! The simpler API: upload a paper, block until the job settles, and hand
//! back the document plus its artifacts in one call. Use
//! [`crate::tracker::DocumentTracker`] directly when the host application
//! needs live status updates, supersession, or its own event plumbing —
//! this module is for scripts and batch jobs.

use crate::config::ClientConfig;
use crate::document::{Artifacts, Document};
use crate::error::TrackerError;
use crate::tracker::{DocumentTracker, TrackerPhase};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Result of a full submit-poll-fetch cycle.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// The final document record as last reported by the service.
    pub document: Document,
    /// The generated summary, glossary, and mind map.
    pub artifacts: Artifacts,
    /// Wall-clock duration from submit to settled artifacts.
    pub duration_ms: u64,
}

/// Submit a local file and wait for its artifacts.
///
/// Polls at `config.poll_interval_ms` until the job reaches a terminal
/// status, then fetches the artifact bundle. There is no overall timeout —
/// a job that never terminates keeps this future pending; wrap in
/// `tokio::time::timeout` if a bound is needed.
///
/// # Errors
/// - [`TrackerError::FileNotFound`] / [`TrackerError::PermissionDenied`] —
///   the local file could not be read
/// - [`TrackerError::Submit`] — the upload was rejected or the service
///   unreachable
/// - [`TrackerError::JobFailed`] — the service reported the analysis as
///   failed (message verbatim from the service)
/// - [`TrackerError::ArtifactFetch`] — the job succeeded but the artifact
///   fetch exhausted its retries
pub async fn analyze(
    path: impl AsRef<Path>,
    config: &ClientConfig,
) -> Result<AnalysisOutput, TrackerError> {
    let start = Instant::now();
    let tracker = DocumentTracker::new(config.clone())?;
    tracker.submit_path(path).await?;

    let snapshot = tracker.wait_until_settled().await;
    let document = snapshot
        .document
        .ok_or_else(|| TrackerError::Internal("settled without a document".into()))?;

    match snapshot.phase {
        TrackerPhase::Failed => Err(TrackerError::JobFailed {
            message: document
                .error
                .clone()
                .unwrap_or_else(|| "analysis failed".to_string()),
            id: document.id,
        }),
        TrackerPhase::Completed => match snapshot.artifacts {
            Some(artifacts) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "analysis of '{}' settled in {}ms",
                    document.filename, duration_ms
                );
                Ok(AnalysisOutput {
                    document,
                    artifacts,
                    duration_ms,
                })
            }
            None => Err(TrackerError::ArtifactFetch {
                retries: config.artifact_max_retries,
                detail: snapshot
                    .artifact_error
                    .unwrap_or_else(|| "unknown error".to_string()),
                id: document.id,
            }),
        },
        phase => Err(TrackerError::Internal(format!(
            "settled in unexpected phase {phase:?}"
        ))),
    }
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    path: impl AsRef<Path>,
    config: &ClientConfig,
) -> Result<AnalysisOutput, TrackerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TrackerError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(analyze(path, config))
}
