//! REST client for the upload endpoint.
//!
//! Wraps `POST /upload` using [`reqwest`]. One request per call, no
//! retry: a failed submission is re-initiated by the user.

use ingest_core::types::UploadJob;
use ingest_core::UploadError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::compressor::CompressedPayload;

/// Multipart field name carrying the compressed file.
pub const FILE_FIELD: &str = "file";

/// MIME type sent for the compressed part.
pub const GZIP_MIME: &str = "application/gzip";

/// HTTP client for the upload endpoint.
pub struct JobSubmitter {
    client: reqwest::Client,
    http_base_url: String,
}

/// Body returned by a successful upload.
#[derive(Debug, Deserialize)]
struct CreatedResponse {
    #[serde(default)]
    job_id: Option<serde_json::Value>,
}

/// Body returned by a failed request.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl JobSubmitter {
    /// * `http_base_url` - Base HTTP URL, e.g. `http://host:8000/api`.
    pub fn new(http_base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), http_base_url)
    }

    /// Create a submitter reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, http_base_url: impl Into<String>) -> Self {
        let url: String = http_base_url.into();
        Self {
            client,
            http_base_url: url.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.http_base_url)
    }

    /// Upload the payload and return the job the backend created for it.
    pub async fn submit(&self, payload: CompressedPayload) -> Result<UploadJob, UploadError> {
        let url = self.upload_url();
        let file_name = payload.file_name;
        let size = payload.bytes.len();

        let part = Part::bytes(payload.bytes)
            .file_name(file_name.clone())
            .mime_str(GZIP_MIME)
            .map_err(|e| UploadError::Submission {
                status: None,
                detail: format!("Failed to build upload request: {e}"),
            })?;
        let form = Form::new().part(FILE_FIELD, part);

        tracing::info!(url = %url, file_name = %file_name, size, "Submitting upload");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Submission {
                status: None,
                detail: format!("Upload request failed: {e}"),
            })?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await.map_err(|e| UploadError::Submission {
            status: None,
            detail: format!("Failed to read upload response: {e}"),
        })?;

        let job_id = parse_job_id(&body)?;
        tracing::info!(job_id = %job_id, "Upload accepted");
        Ok(UploadJob::new(job_id))
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, or a
    /// [`UploadError::Submission`] carrying the backend detail.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body)
            .unwrap_or_else(|| format!("Upload failed with status {}", status.as_u16()));

        tracing::warn!(status = status.as_u16(), detail = %detail, "Upload rejected");
        Err(UploadError::submission(status.as_u16(), detail))
    }
}

/// Pull the `job_id` string out of a creation response body.
fn parse_job_id(body: &str) -> Result<String, UploadError> {
    let parsed: CreatedResponse = serde_json::from_str(body)
        .map_err(|e| UploadError::Protocol(format!("Upload response is not valid JSON: {e}")))?;

    match parsed.job_id {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id),
        Some(_) => Err(UploadError::Protocol(
            "Upload response field job_id is not a non-empty string".into(),
        )),
        None => Err(UploadError::Protocol(
            "Upload response is missing job_id".into(),
        )),
    }
}

/// The backend's human-readable `detail`, when it is a string.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorResponse = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn job_id_is_extracted() {
        assert_eq!(parse_job_id(r#"{"job_id":"4f2a"}"#).unwrap(), "4f2a");
    }

    #[test]
    fn missing_job_id_is_protocol_error() {
        assert_matches!(parse_job_id(r#"{"status":"ok"}"#), Err(UploadError::Protocol(_)));
        assert_matches!(parse_job_id(r#"{"job_id":42}"#), Err(UploadError::Protocol(_)));
        assert_matches!(parse_job_id("accepted"), Err(UploadError::Protocol(_)));
    }

    #[test]
    fn detail_only_when_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"Filename is required"}"#).as_deref(),
            Some("Filename is required")
        );
        assert_eq!(extract_detail(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(extract_detail("<html>502</html>"), None);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let submitter = JobSubmitter::new("http://localhost:8000/api/");
        assert_eq!(submitter.upload_url(), "http://localhost:8000/api/upload");
    }
}
