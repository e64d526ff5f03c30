//! Configuration for the PaperHelper client.
//!
//! All behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between the tracker and the CLI, and to
//! resolve everything from the environment in one place at startup.

use crate::error::TrackerError;
use crate::events::EventCallback;
use std::fmt;
use std::sync::Arc;

/// Default base URL of the PaperHelper service, used when
/// `PAPERHELPER_BASE_URL` is unset (local development address).
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Fixed status-poll cadence in milliseconds.
///
/// The tracker re-polls at this interval while a job is `pending` or
/// `processing`. Exposed as a config field for callers who need a
/// different cadence (tests use a few milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2500;

/// Configuration for [`crate::tracker::DocumentTracker`] and the eager
/// [`crate::analyze::analyze`] entry point.
///
/// # Example
/// ```rust
/// use paperhelper_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://analysis.internal:8000")
///     .poll_interval_ms(1000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the PaperHelper service, without a trailing slash.
    pub base_url: String,

    /// Status-poll cadence in milliseconds. Default: 2500.
    ///
    /// Polling is level-triggered: it continues at this fixed interval
    /// until a terminal status is observed. There is no retry cap and no
    /// backoff; a slow job simply keeps polling.
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Maximum retry attempts when the artifact fetch fails after a
    /// `completed` status. Default: 3.
    ///
    /// The job itself succeeded at that point, so the fetch is worth a
    /// few retries before the failure is surfaced as `artifact_error`.
    pub artifact_max_retries: u32,

    /// Initial artifact-fetch retry delay in milliseconds, doubling after
    /// each attempt (500 ms → 1 s → 2 s). Default: 500.
    pub artifact_retry_backoff_ms: u64,

    /// Lifecycle event callback. Default: none (no-op).
    pub events: Option<EventCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: 30,
            artifact_max_retries: 3,
            artifact_retry_backoff_ms: 500,
            events: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("artifact_max_retries", &self.artifact_max_retries)
            .field("artifact_retry_backoff_ms", &self.artifact_retry_backoff_ms)
            .field("events", &self.events.as_ref().map(|_| "<dyn TrackerEvents>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve a configuration from the environment.
    ///
    /// Reads `PAPERHELPER_BASE_URL` and `PAPERHELPER_POLL_INTERVAL_MS`,
    /// falling back to the documented defaults for anything unset or
    /// unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("PAPERHELPER_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.base_url),
            poll_interval_ms: std::env::var("PAPERHELPER_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.poll_interval_ms),
            ..default
        }
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn artifact_max_retries(mut self, n: u32) -> Self {
        self.config.artifact_max_retries = n;
        self
    }

    pub fn artifact_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.artifact_retry_backoff_ms = ms;
        self
    }

    pub fn events(mut self, events: Arc<dyn crate::events::TrackerEvents>) -> Self {
        self.config.events = Some(events);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, TrackerError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(TrackerError::InvalidConfig("base_url must not be empty".into()));
        }
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(TrackerError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}
