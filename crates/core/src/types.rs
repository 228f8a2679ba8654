//! Shared domain types for one upload cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server-side processing job created by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadJob {
    /// Opaque identifier assigned by the backend.
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Origin of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Generated locally (connect, disconnect, reconnect notices).
    System,
    Log,
    Progress,
    Complete,
    Error,
}

/// One line in the ordered job log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

impl LogEntry {
    /// Create an entry without progress counters.
    pub fn new(kind: LogKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
            processed: None,
            total: None,
            percentage: None,
        }
    }

    /// Attach the counters of a progress snapshot.
    pub fn with_progress(mut self, progress: &ProgressSnapshot) -> Self {
        self.processed = Some(progress.processed);
        self.total = Some(progress.total);
        self.percentage = Some(progress.percentage);
        self
    }
}

/// Last-known job progress. Derived from `progress` and `complete` frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    /// Always within `0.0..=100.0`.
    pub percentage: f64,
}

/// Clamp a percentage into `0..=100`, mapping NaN to zero.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
