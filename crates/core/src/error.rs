//! Error taxonomy for the upload pipeline.
//!
//! Every variant renders as a user-visible message. Callers match on the
//! variant to decide whether re-initiating the upload makes sense; none of
//! these are retried automatically except transient stream closures, which
//! never surface here.

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The input file was absent or its name was not acceptable.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Reading or gzip-encoding the payload failed.
    #[error("Compression failed: {0}")]
    Compression(String),

    /// The upload request failed at the HTTP level.
    #[error("Upload failed: {detail}")]
    Submission {
        /// HTTP status code, `None` when no response was received.
        status: Option<u16>,
        /// Backend-supplied `detail` when present, else a generic message.
        detail: String,
    },

    /// The backend answered 2xx but broke the response contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The status stream failed terminally.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Required configuration was missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl UploadError {
    /// Build a [`UploadError::Submission`] for a response that carried a
    /// status code.
    pub fn submission(status: u16, detail: impl Into<String>) -> Self {
        Self::Submission {
            status: Some(status),
            detail: detail.into(),
        }
    }
}
