//! HTTP transport against the PaperHelper service.
//!
//! The [`DocumentTransport`] trait is the seam between the lifecycle
//! tracker and the network: the tracker only ever talks to an
//! `Arc<dyn DocumentTransport>`, so tests drive the state machine with a
//! scripted in-memory transport while production uses [`HttpTransport`].
//!
//! The contract is three single-round-trip operations:
//!
//! ```text
//! submit        POST {base}/api/documents            multipart field "file"
//! get_status    GET  {base}/api/documents/{id}
//! get_artifacts GET  {base}/api/documents/{id}/mindmap
//! ```
//!
//! `get_artifacts` is defined only for a `completed` document; the tracker
//! upholds that contract and never calls it earlier. The `/mindmap` path
//! is a naming artifact of the service — it returns the full artifact
//! bundle (summary + glossary + mind map), not only the graph.

use crate::config::ClientConfig;
use crate::document::{Artifacts, Document};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// The three network operations the lifecycle tracker depends on.
///
/// Implementations must not retry internally: retry policy (swallow and
/// re-poll for status, bounded backoff for artifacts) belongs to the
/// tracker, and a transport that retries underneath it would skew the
/// cadence the tracker guarantees.
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    /// Upload a file for analysis; returns the newly created document
    /// record (status typically `pending`).
    async fn submit(&self, filename: &str, bytes: Vec<u8>) -> Result<Document, TransportError>;

    /// Fetch the current document record for `id`.
    async fn get_status(&self, id: &str) -> Result<Document, TransportError>;

    /// Fetch the artifact bundle for a completed document.
    async fn get_artifacts(&self, id: &str) -> Result<Artifacts, TransportError>;
}

/// Production transport over [`reqwest`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport from the client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TransportError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/api/documents", self.base_url)
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/api/documents/{}", self.base_url, id)
    }

    fn artifacts_url(&self, id: &str) -> String {
        format!("{}/api/documents/{}/mindmap", self.base_url, id)
    }

    /// Decode a response, mapping HTTP and body failures to the error
    /// taxonomy. `id` enables the distinguishable not-found case for the
    /// id-keyed endpoints.
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
        id: Option<&str>,
    ) -> Result<T, TransportError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(TransportError::NotFound { id: id.to_string() });
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                body: truncate(&body, 200),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network {
                url: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        serde_json::from_str(&body).map_err(|e| TransportError::MalformedBody {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })
    }

    fn send_error(endpoint: &str, e: reqwest::Error) -> TransportError {
        TransportError::Network {
            url: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl DocumentTransport for HttpTransport {
    async fn submit(&self, filename: &str, bytes: Vec<u8>) -> Result<Document, TransportError> {
        let endpoint = self.documents_url();
        debug!("POST {} ({} bytes as '{}')", endpoint, bytes.len(), filename);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(guess_mime(filename))
            .map_err(|e| TransportError::Internal(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::send_error(&endpoint, e))?;

        Self::decode(response, &endpoint, None).await
    }

    async fn get_status(&self, id: &str) -> Result<Document, TransportError> {
        let endpoint = self.document_url(id);
        debug!("GET {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| Self::send_error(&endpoint, e))?;

        Self::decode(response, &endpoint, Some(id)).await
    }

    async fn get_artifacts(&self, id: &str) -> Result<Artifacts, TransportError> {
        let endpoint = self.artifacts_url(id);
        debug!("GET {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| Self::send_error(&endpoint, e))?;

        Self::decode(response, &endpoint, Some(id)).await
    }
}

/// Best-effort media type for the multipart part.
///
/// The service accepts PDF, Markdown, and plain text; anything else is
/// sent as octet-stream and left to the service to reject.
fn guess_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "md" | "markdown" => "text/markdown",
        "txt" | "text" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
