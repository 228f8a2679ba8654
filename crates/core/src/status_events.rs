//! Job status frames and parser.
//!
//! The backend pushes JSON text frames over the per-job WebSocket with
//! the shape `{"type": "<kind>", ...fields}`. This module deserializes
//! them into a strongly-typed [`StatusEvent`] enum.

use serde::Deserialize;

/// All known status frame types.
///
/// Deserialized via the internally-tagged `"type"` field; the remaining
/// fields of the frame belong to the variant payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StatusEvent {
    /// Free-form progress narration from the job.
    #[serde(rename = "log")]
    Log(LogData),

    /// Rows processed so far.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// The job finished successfully.
    #[serde(rename = "complete")]
    Complete(CompleteData),

    /// The job failed.
    #[serde(rename = "error")]
    Error(ErrorData),
}

/// Payload for `log` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogData {
    pub message: String,
}

/// Payload for `progress` frames.
///
/// `total` and `percentage` are optional: some backends only report a
/// running row count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressData {
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload for `complete` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompleteData {
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload for `error` frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorData {
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Parse a single JSON status frame into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log and continue.
pub fn parse_event(text: &str) -> Result<StatusEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Parse a text message that may carry several newline-delimited frames.
///
/// Blank lines are skipped. Each remaining line yields its own result so
/// one corrupt line does not hide its neighbours.
pub fn parse_frames(text: &str) -> Vec<Result<StatusEvent, serde_json::Error>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_event)
        .collect()
}
