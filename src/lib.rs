//! # paperhelper-client
//!
//! Client for the PaperHelper document-analysis service: submit a paper,
//! track the asynchronous job, and fetch the generated summary, glossary,
//! and mind map when it completes.
//!
//! ## Lifecycle Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Submit   POST /api/documents (multipart) → Document{id, status}
//!  ├─ 2. Track    GET /api/documents/{id} every 2.5 s while non-terminal
//!  ├─ 3. Fetch    GET /api/documents/{id}/mindmap, exactly once, on completed
//!  └─ 4. Read     snapshot / watch subscription / settled artifacts
//! ```
//!
//! The heart of the crate is [`tracker::DocumentTracker`], the state
//! machine that owns the single active document, polls at a fixed cadence,
//! discards stale responses when a new upload supersedes the old one, and
//! issues the artifact fetch exactly once. Everything else is plumbing
//! around it: [`transport`] speaks HTTP, [`events`] notifies a host
//! application, and [`analyze`] wraps the whole cycle in one call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperhelper_client::{analyze, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Base URL resolved from PAPERHELPER_BASE_URL, default localhost:8000
//!     let config = ClientConfig::from_env();
//!     let output = analyze("paper.pdf", &config).await?;
//!     println!("{}", output.artifacts.summary);
//!     eprintln!(
//!         "{} glossary terms, {} mind-map nodes",
//!         output.artifacts.glossary.len(),
//!         output.artifacts.mind_map.nodes.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperhelper` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paperhelper-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod tracker;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, AnalysisOutput};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_MS};
pub use document::{
    Artifacts, Document, DocumentStatus, GlossaryEntry, MindMap, MindMapEdge, MindMapNode,
};
pub use error::{TrackerError, TransportError};
pub use events::{EventCallback, NoopTrackerEvents, TrackerEvents};
pub use tracker::{DocumentTracker, TrackerPhase, TrackerSnapshot};
pub use transport::{DocumentTransport, HttpTransport};
