//! Event-callback trait for document lifecycle notifications.
//!
//! Inject an [`Arc<dyn TrackerEvents>`] via
//! [`crate::config::ClientConfigBuilder::events`] to receive real-time
//! events as the tracker moves a document through its lifecycle.
//!
//! Callbacks are the least-invasive integration point for a presentation
//! surface: callers can forward events to a channel, a WebSocket, or a
//! terminal progress bar without the library knowing how the host
//! application communicates. The trait is `Send + Sync` because events
//! fire from the tracker's background poll task.
//!
//! # Example
//!
//! ```rust
//! use paperhelper_client::{ClientConfig, TrackerEvents};
//! use paperhelper_client::document::Document;
//! use std::sync::Arc;
//!
//! struct LoggingEvents;
//!
//! impl TrackerEvents for LoggingEvents {
//!     fn on_status(&self, document: &Document) {
//!         eprintln!("{}: {}", document.id, document.status);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .events(Arc::new(LoggingEvents))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::Document;
use std::sync::Arc;

/// Called by the tracker as the active document's lifecycle progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for a superseded document are never
/// delivered after a newer upload has been adopted.
pub trait TrackerEvents: Send + Sync {
    /// A new document was adopted after a successful upload.
    fn on_submitted(&self, document: &Document) {
        let _ = document;
    }

    /// A status poll returned; fires for every poll result, including
    /// `pending`→`pending` repeats.
    fn on_status(&self, document: &Document) {
        let _ = document;
    }

    /// A single status poll failed at the transport level.
    ///
    /// Informational only — the tracker retries on the next tick and the
    /// failure is never user-visible as a lifecycle change.
    fn on_poll_error(&self, id: &str, error: &str) {
        let _ = (id, error);
    }

    /// The document reached `completed`; the artifact fetch is being issued.
    fn on_completed(&self, document: &Document) {
        let _ = document;
    }

    /// Artifacts arrived and are attached to the tracked document.
    fn on_artifacts_ready(&self, id: &str) {
        let _ = id;
    }

    /// The artifact fetch failed after all retries.
    ///
    /// The tracker stays in `Completed` with no artifacts attached;
    /// `refetch_artifacts` is the manual-retry affordance.
    fn on_artifact_fetch_failed(&self, id: &str, retries: u32, error: &str) {
        let _ = (id, retries, error);
    }

    /// The document reached `failed` with the given service error message.
    fn on_failed(&self, id: &str, message: &str) {
        let _ = (id, message);
    }
}

/// A no-op implementation for callers that don't need events.
///
/// This is the default when no callback is configured.
pub struct NoopTrackerEvents;

impl TrackerEvents for NoopTrackerEvents {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type EventCallback = Arc<dyn TrackerEvents>;
