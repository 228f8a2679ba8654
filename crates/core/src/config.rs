use std::time::Duration;

use crate::error::UploadError;

/// Default pause between a dropped stream and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Default file extension accepted for upload.
pub const DEFAULT_EXTENSION: &str = "csv";

/// Client configuration for the upload pipeline.
///
/// Nothing is hardcoded: base URLs come from the environment (or are
/// passed explicitly via [`ClientConfig::new`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base HTTP endpoint, e.g. `http://localhost:8000/api`.
    pub http_base_url: String,
    /// Base WebSocket endpoint; the job id is appended as a path segment.
    pub stream_base_url: String,
    /// Fixed delay before reconnecting a dropped status stream.
    pub reconnect_delay: Duration,
    /// File extension (without the dot) accepted for upload.
    pub accepted_extension: String,
}

impl ClientConfig {
    /// Build a configuration with default delay and extension.
    pub fn new(http_base_url: impl Into<String>, stream_base_url: impl Into<String>) -> Self {
        Self {
            http_base_url: trim_base(http_base_url.into()),
            stream_base_url: trim_base(stream_base_url.into()),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            accepted_extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `API_BASE_URL`       | required |
    /// | `WS_BASE_URL`        | required |
    /// | `RECONNECT_DELAY_MS` | `3000`  |
    /// | `UPLOAD_EXTENSION`   | `csv`   |
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UploadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| UploadError::Config(format!("{key} must be set")))
        };

        let http_base_url = required("API_BASE_URL")?;
        let stream_base_url = required("WS_BASE_URL")?;

        let reconnect_delay_ms = match lookup("RECONNECT_DELAY_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                UploadError::Config(format!("RECONNECT_DELAY_MS must be a valid u64, got {raw:?}"))
            })?,
            None => DEFAULT_RECONNECT_DELAY_MS,
        };

        let accepted_extension = lookup("UPLOAD_EXTENSION")
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Ok(Self {
            accepted_extension,
            ..Self::new(http_base_url, stream_base_url)
                .with_reconnect_delay(Duration::from_millis(reconnect_delay_ms))
        })
    }

    /// Full URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.http_base_url)
    }

    /// Full URL of the status channel for `job_id`.
    pub fn stream_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.stream_base_url, job_id)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
