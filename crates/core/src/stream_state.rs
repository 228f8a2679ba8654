//! Pure state machine for a job status stream.
//!
//! Socket callbacks (open, frame, close, failure) and timer/user actions
//! are fed in as [`StreamInput`]s. [`StreamState::apply`] mutates the
//! derived state (connection state, ordered log, progress) and returns
//! the [`StreamEffect`]s the runtime driver must perform. No I/O happens
//! here, so every transition is testable without a socket.
//!
//! ```text
//! disconnected --Start--------> connecting        [Connect]
//! connecting   --Opened-------> connected
//! connecting   --ConnectFailed> error      (terminal)
//! connected    --Event(log|progress)--> connected
//! connected    --Event(complete)------> complete (terminal) [CloseSocket]
//! connected    --Event(error)---------> error    (terminal) [CloseSocket]
//! connected    --Closed-------> disconnected      [ScheduleReconnect]
//! disconnected --ReconnectDue-> connecting        [Connect]
//! any          --Stop---------> disconnected, cancelled, cleared
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::status_events::{CompleteData, ErrorData, ProgressData, StatusEvent};
use crate::types::{clamp_percentage, LogEntry, LogKind, ProgressSnapshot};

/// Connection lifecycle of one job stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Complete,
    Error,
}

impl ConnectionState {
    /// `Complete` and `Error` end the stream for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can happen to a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInput {
    /// Begin streaming (first connection attempt).
    Start,
    /// The socket handshake succeeded.
    Opened,
    /// The socket could not be opened.
    ConnectFailed(String),
    /// A well-formed status frame arrived.
    Event(StatusEvent),
    /// The socket closed or failed after it was open.
    Closed(Option<String>),
    /// The reconnect delay elapsed.
    ReconnectDue,
    /// Explicit stop, job change, or owner teardown.
    Stop,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEffect {
    /// Open a new socket to the job's status channel.
    Connect,
    /// Close the current socket if one is open.
    CloseSocket,
    /// Arm the fixed-delay reconnect timer.
    ScheduleReconnect,
    /// Disarm the reconnect timer if armed.
    CancelReconnect,
}

/// Derived state of one job's status stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamState {
    job_id: String,
    connection: ConnectionState,
    /// Set by [`StreamInput::Stop`]; blocks every later transition.
    cancelled: bool,
    logs: Vec<LogEntry>,
    progress: ProgressSnapshot,
    error: Option<String>,
    /// Number of connection attempts made so far.
    attempts: u32,
}

impl StreamState {
    /// Fresh, empty state for `job_id`.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            connection: ConnectionState::Disconnected,
            cancelled: false,
            logs: Vec::new(),
            progress: ProgressSnapshot::default(),
            error: None,
            attempts: 0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True once the stream will never change again on its own.
    pub fn is_finished(&self) -> bool {
        self.cancelled || self.connection.is_terminal()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress
    }

    /// Message of the terminal error, if the stream ended in `error`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Apply one input at time `now` and return the effects to perform.
    pub fn apply(&mut self, input: StreamInput, now: DateTime<Utc>) -> Vec<StreamEffect> {
        if let StreamInput::Stop = input {
            return self.stop();
        }
        if self.cancelled || self.connection.is_terminal() {
            return Vec::new();
        }

        match (self.connection, input) {
            (ConnectionState::Disconnected, StreamInput::Start) if self.attempts == 0 => {
                self.begin_attempt()
            }
            (ConnectionState::Disconnected, StreamInput::ReconnectDue) if self.attempts > 0 => {
                self.begin_attempt()
            }
            (ConnectionState::Connecting, StreamInput::Opened) => {
                self.connection = ConnectionState::Connected;
                let message = if self.attempts > 1 {
                    format!("Reconnected to job stream (attempt {})", self.attempts)
                } else {
                    "Connected to job stream".to_string()
                };
                self.push(LogEntry::new(LogKind::System, message, now));
                Vec::new()
            }
            (ConnectionState::Connecting, StreamInput::ConnectFailed(reason)) => {
                let message = format!("Failed to connect to job stream: {reason}");
                self.push(LogEntry::new(LogKind::Error, message.clone(), now));
                self.error = Some(message);
                self.connection = ConnectionState::Error;
                Vec::new()
            }
            (ConnectionState::Connected, StreamInput::Event(event)) => self.on_event(event, now),
            (ConnectionState::Connected, StreamInput::Closed(reason)) => {
                let message = match reason {
                    Some(reason) => format!("Connection lost ({reason}), reconnecting"),
                    None => "Connection lost, reconnecting".to_string(),
                };
                self.push(LogEntry::new(LogKind::System, message, now));
                self.connection = ConnectionState::Disconnected;
                vec![StreamEffect::ScheduleReconnect]
            }
            _ => Vec::new(),
        }
    }

    fn begin_attempt(&mut self) -> Vec<StreamEffect> {
        self.attempts += 1;
        self.connection = ConnectionState::Connecting;
        vec![StreamEffect::Connect]
    }

    fn stop(&mut self) -> Vec<StreamEffect> {
        let job_id = std::mem::take(&mut self.job_id);
        *self = Self::new(job_id);
        self.cancelled = true;
        vec![StreamEffect::CancelReconnect, StreamEffect::CloseSocket]
    }

    fn on_event(&mut self, event: StatusEvent, now: DateTime<Utc>) -> Vec<StreamEffect> {
        match event {
            StatusEvent::Log(data) => {
                self.push(LogEntry::new(LogKind::Log, data.message, now));
                Vec::new()
            }
            StatusEvent::Progress(data) => {
                self.on_progress(data, now);
                Vec::new()
            }
            StatusEvent::Complete(data) => {
                self.on_complete(data, now);
                vec![StreamEffect::CloseSocket]
            }
            StatusEvent::Error(data) => {
                self.on_error(data, now);
                vec![StreamEffect::CloseSocket]
            }
        }
    }

    fn on_progress(&mut self, data: ProgressData, now: DateTime<Utc>) {
        let total = data.total.unwrap_or(self.progress.total);
        let percentage = match data.percentage {
            Some(p) => clamp_percentage(p),
            None if total > 0 => clamp_percentage(data.processed as f64 / total as f64 * 100.0),
            None => self.progress.percentage,
        };
        self.progress = ProgressSnapshot {
            processed: data.processed,
            total,
            percentage,
        };

        let message = data.message.unwrap_or_else(|| {
            if total > 0 {
                format!("Processed {} of {} rows", data.processed, total)
            } else {
                format!("Processed {} rows", data.processed)
            }
        });
        let entry = LogEntry::new(LogKind::Progress, message, now).with_progress(&self.progress);
        self.push(entry);
    }

    fn on_complete(&mut self, data: CompleteData, now: DateTime<Utc>) {
        let total = data
            .total
            .unwrap_or_else(|| self.progress.total.max(data.processed));
        self.progress = ProgressSnapshot {
            processed: data.processed,
            total,
            percentage: 100.0,
        };

        let message = data
            .message
            .unwrap_or_else(|| format!("Processing complete: {} rows", data.processed));
        let entry = LogEntry::new(LogKind::Complete, message, now).with_progress(&self.progress);
        self.push(entry);
        self.connection = ConnectionState::Complete;
    }

    fn on_error(&mut self, data: ErrorData, now: DateTime<Utc>) {
        let message = match data.detail {
            Some(detail) => format!("{}: {detail}", data.message),
            None => data.message.clone(),
        };
        self.push(LogEntry::new(LogKind::Error, message, now));
        self.error = Some(data.message);
        self.connection = ConnectionState::Error;
    }

    fn push(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }
}

/// Functional form of [`StreamState::apply`]: consume a state and an
/// input, return the next state and its effects.
pub fn transition(
    mut state: StreamState,
    input: StreamInput,
    now: DateTime<Utc>,
) -> (StreamState, Vec<StreamEffect>) {
    let effects = state.apply(input, now);
    (state, effects)
}
