//! Error types for the paperhelper-client library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TrackerError`] — **Fatal**: the caller's request cannot proceed
//!   (file unreadable, upload rejected, job reported `failed`, artifact
//!   fetch exhausted its retries). Returned as `Err(TrackerError)` from
//!   [`crate::tracker::DocumentTracker::submit_path`] and
//!   [`crate::analyze::analyze`].
//!
//! * [`TransportError`] — **Per-request**: a single HTTP round trip failed.
//!   A failed status poll is swallowed by the tracker and retried on the
//!   next tick; only when a transport error aborts an upload or exhausts
//!   the artifact-fetch retries does it surface, wrapped in a
//!   [`TrackerError`].
//!
//! The separation keeps the state machine's contract visible in the types:
//! poll failures never terminate tracking, only an explicit `failed` status
//! from the service does.

use std::path::PathBuf;
use thiserror::Error;

/// A single failed HTTP round trip against the PaperHelper service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure: connection refused, DNS, timeout.
    #[error("service unreachable at '{url}': {reason}\nCheck the service is running and PAPERHELPER_BASE_URL is correct.")]
    Network { url: String, reason: String },

    /// The service does not know the given document identifier.
    #[error("document '{id}' not found on the service")]
    NotFound { id: String },

    /// Non-2xx response that is not a 404.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// 2xx response whose body could not be decoded as the expected JSON.
    #[error("malformed response body from {endpoint}: {detail}")]
    MalformedBody { endpoint: String, detail: String },

    /// Unexpected internal error (client construction, request building).
    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    /// True when the failure means the identifier is unknown server-side,
    /// as opposed to a transient network or server fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

/// All fatal errors returned by the tracker and the eager entry points.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Upload file was not found at the given path.
    #[error("file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the upload file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The upload was rejected or the service was unreachable.
    ///
    /// The tracker returns to `Idle`; the user must re-attempt the upload.
    #[error("submit failed: {source}")]
    Submit {
        #[source]
        source: TransportError,
    },

    /// The service reported the job itself as `failed`.
    ///
    /// Terminal — the message is the service's own `error` field, verbatim.
    #[error("analysis of document '{id}' failed: {message}")]
    JobFailed { id: String, message: String },

    /// The job completed but the artifact fetch failed after all retries.
    ///
    /// Distinct from [`JobFailed`](TrackerError::JobFailed) — the analysis
    /// itself succeeded. Call
    /// [`refetch_artifacts`](crate::tracker::DocumentTracker::refetch_artifacts)
    /// to retry manually.
    #[error("artifacts for document '{id}' could not be fetched after {retries} retries: {detail}")]
    ArtifactFetch {
        id: String,
        retries: u32,
        detail: String,
    },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
