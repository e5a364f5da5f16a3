//! Client configuration from the environment.

use std::time::Duration;

use playwriter_core::error::SyncError;

/// Base URL used when `PLAYWRITER_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Connection settings for [`crate::http::HttpNarrativeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Total timeout for request/response calls.
    pub request_timeout: Duration,
    /// Total timeout for scene and act advancement, which run many beats
    /// server-side before answering.
    pub unit_timeout: Duration,
    /// TCP connect timeout for every call.
    pub connect_timeout: Duration,
    /// Longest silence tolerated between stream chunks.
    pub stream_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            request_timeout: Duration::from_secs(180),
            unit_timeout: Duration::from_secs(1800),
            connect_timeout: Duration::from_secs(10),
            stream_idle_timeout: Duration::from_secs(120),
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration pointed at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            ..Self::default()
        }
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if a value is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let defaults = Self::default();
        let base_url = lookup("PLAYWRITER_API_URL").unwrap_or(defaults.base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "PLAYWRITER_API_URL must be an http(s) URL, got '{base_url}'"
            )));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout: seconds(
                &lookup,
                "PLAYWRITER_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            )?,
            unit_timeout: seconds(&lookup, "PLAYWRITER_UNIT_TIMEOUT_SECS", defaults.unit_timeout)?,
            connect_timeout: seconds(
                &lookup,
                "PLAYWRITER_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            )?,
            stream_idle_timeout: seconds(
                &lookup,
                "PLAYWRITER_STREAM_IDLE_TIMEOUT_SECS",
                defaults.stream_idle_timeout,
            )?,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, SyncError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(SyncError::Config(format!(
                "{key} must be a positive number of seconds, got '{raw}'"
            ))),
            Ok(secs) => Ok(Duration::from_secs(secs)),
        },
    }
}
