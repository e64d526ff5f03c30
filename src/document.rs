//! Wire types for the PaperHelper service API.
//!
//! These mirror the JSON the service emits. Deserialisation is tolerant:
//! fields this client does not use (`storage_path`, `uploaded_at`, …) are
//! simply ignored, so server-side additions never break the client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a submitted document.
///
/// Statuses are monotonic with respect to terminality: once a document
/// reports [`Completed`](DocumentStatus::Completed) or
/// [`Failed`](DocumentStatus::Failed) it never leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Accepted by the service, not yet picked up by the analysis worker.
    Pending,
    /// Analysis in progress.
    Processing,
    /// Analysis finished; artifacts are available.
    Completed,
    /// Analysis failed; see [`Document::error`].
    Failed,
}

impl DocumentStatus {
    /// True for `Completed` and `Failed` — no further transitions occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One submitted analysis job as the service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identifier assigned by the service at submission time.
    pub id: String,
    /// Original file name, for display only.
    pub filename: String,
    /// Current lifecycle status.
    pub status: DocumentStatus,
    /// Failure message; present only when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Opaque key/value metadata, forwarded unchanged.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Artifacts the service may inline on an already-completed record.
    ///
    /// When present the tracker adopts these directly and skips the
    /// separate artifact fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
}

/// Analysis output for a completed [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifacts {
    /// Single text block summarising the paper.
    pub summary: String,
    /// Concept graph extracted from the paper.
    pub mind_map: MindMap,
    /// Glossary entries, in the service's ranking order.
    #[serde(default)]
    pub glossary: Vec<GlossaryEntry>,
}

/// Concept graph: weighted nodes and weighted edges between them.
///
/// Edge endpoints reference node `id`s. Referential integrity is assumed
/// from the service, not validated here; renderers may fail gracefully if
/// it is violated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindMap {
    #[serde(default)]
    pub nodes: Vec<MindMapNode>,
    #[serde(default)]
    pub edges: Vec<MindMapEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: String,
    pub label: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindMapEdge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// One ranked glossary term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
    pub score: f64,
    /// Section names or snippets where the term appears.
    #[serde(default)]
    pub references: Vec<String>,
}

fn default_weight() -> f64 {
    1.0
}
