//! End-to-end orchestration of one upload cycle.
//!
//! [`UploadController`] runs compress -> submit -> stream for a
//! user-supplied file and merges the outcome into a single
//! [`UploadView`].

use std::path::Path;
use std::sync::Arc;

use ingest_core::stream_state::{ConnectionState, StreamState};
use ingest_core::types::{LogEntry, ProgressSnapshot, UploadJob};
use ingest_core::{ClientConfig, UploadError};
use serde::Serialize;

use crate::compressor::PayloadCompressor;
use crate::stream::JobStatusStream;
use crate::submitter::JobSubmitter;
use crate::transport::{StatusTransport, WsTransport};

/// Merged, caller-facing view of the current upload cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadView {
    pub job_id: Option<String>,
    pub status: ConnectionState,
    pub progress: ProgressSnapshot,
    pub logs: Vec<LogEntry>,
    /// Submission failure or terminal stream error, whichever applies.
    pub error: Option<String>,
}

/// Drives uploads and owns the stream of the current job.
pub struct UploadController {
    config: ClientConfig,
    compressor: PayloadCompressor,
    submitter: JobSubmitter,
    transport: Arc<dyn StatusTransport>,
    job: Option<UploadJob>,
    submission_error: Option<String>,
    stream: Option<JobStatusStream>,
}

impl UploadController {
    /// Controller using the WebSocket transport.
    pub fn new(config: ClientConfig) -> Self {
        let submitter = JobSubmitter::new(config.http_base_url.clone());
        Self::with_parts(config, submitter, Arc::new(WsTransport))
    }

    /// Controller with an explicit submitter and status transport.
    pub fn with_parts(
        config: ClientConfig,
        submitter: JobSubmitter,
        transport: Arc<dyn StatusTransport>,
    ) -> Self {
        Self {
            compressor: PayloadCompressor::new(config.accepted_extension.clone()),
            config,
            submitter,
            transport,
            job: None,
            submission_error: None,
            stream: None,
        }
    }

    /// Upload `file` and start streaming its job status.
    ///
    /// Any previous cycle is reset first. On failure the error is
    /// recorded for [`view`](Self::view) and no stream is started.
    pub async fn upload(&mut self, file: Option<&Path>) -> Result<UploadJob, UploadError> {
        self.reset();

        match self.submit(file).await {
            Ok(job) => {
                tracing::info!(job_id = %job.id, "Upload submitted, starting status stream");
                self.stream = Some(JobStatusStream::start(
                    job.id.clone(),
                    &self.config,
                    Arc::clone(&self.transport),
                ));
                self.job = Some(job.clone());
                Ok(job)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upload failed");
                self.submission_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Clear the job, the submission error and stop the stream.
    pub fn reset(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.job = None;
        self.submission_error = None;
    }

    pub fn job(&self) -> Option<&UploadJob> {
        self.job.as_ref()
    }

    pub fn stream(&self) -> Option<&JobStatusStream> {
        self.stream.as_ref()
    }

    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    /// Current merged state of the cycle.
    pub fn view(&self) -> UploadView {
        let state = self.stream.as_ref().map(JobStatusStream::snapshot);
        merge_view(
            self.job.as_ref(),
            self.submission_error.as_deref(),
            state.as_ref(),
        )
    }

    async fn submit(&self, file: Option<&Path>) -> Result<UploadJob, UploadError> {
        let path = file.ok_or_else(|| UploadError::Validation("No file selected".into()))?;
        let payload = self.compressor.compress_file(path).await?;
        self.submitter.submit(payload).await
    }
}

/// Combine controller fields and stream state into an [`UploadView`].
pub fn merge_view(
    job: Option<&UploadJob>,
    submission_error: Option<&str>,
    state: Option<&StreamState>,
) -> UploadView {
    match state {
        Some(state) => UploadView {
            job_id: job.map(|j| j.id.clone()),
            status: state.connection(),
            progress: state.progress(),
            logs: state.logs().to_vec(),
            error: submission_error
                .or_else(|| state.error())
                .map(str::to_string),
        },
        None => UploadView {
            job_id: job.map(|j| j.id.clone()),
            status: ConnectionState::Disconnected,
            progress: ProgressSnapshot::default(),
            logs: Vec::new(),
            error: submission_error.map(str::to_string),
        },
    }
}
