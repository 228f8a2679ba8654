//! Live status stream for one job.
//!
//! [`JobStatusStream::start`] spawns a task that drives the pure
//! [`StreamState`] machine: it opens the per-job connection, feeds frames
//! and socket events in as [`StreamInput`]s and performs the returned
//! [`StreamEffect`]s (connect, close, fixed-delay reconnect).
//!
//! The state lives in a [`tokio::sync::watch`] channel. Observers call
//! [`subscribe`](JobStatusStream::subscribe) or
//! [`snapshot`](JobStatusStream::snapshot). [`stop`](JobStatusStream::stop)
//! applies the stop transition synchronously and cancels the task, which
//! aborts any pending connect or reconnect sleep and closes the socket.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ingest_core::status_events::parse_frames;
use ingest_core::stream_state::{StreamEffect, StreamInput, StreamState};
use ingest_core::ClientConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{Incoming, StatusConnection, StatusTransport, TransportError};

/// Handle to a running job status stream.
///
/// Dropping the handle stops the stream.
pub struct JobStatusStream {
    job_id: String,
    state: Arc<watch::Sender<StreamState>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobStatusStream {
    /// Start streaming status for `job_id` from
    /// `{config.stream_base_url}/{job_id}`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        job_id: impl Into<String>,
        config: &ClientConfig,
        transport: Arc<dyn StatusTransport>,
    ) -> Self {
        let job_id = job_id.into();
        let (state_tx, _) = watch::channel(StreamState::new(job_id.clone()));
        let state = Arc::new(state_tx);
        let cancel = CancellationToken::new();

        let driver = Driver {
            job_id: job_id.clone(),
            url: config.stream_url(&job_id),
            reconnect_delay: config.reconnect_delay,
            transport,
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(async move {
            driver.run().await;
        });

        Self {
            job_id,
            state,
            cancel,
            task,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> StreamState {
        self.state.borrow().clone()
    }

    /// Stop the stream: no reconnection, pending timer cancelled, socket
    /// closed, derived state cleared. Idempotent.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_modify(|state| {
            state.apply(StreamInput::Stop, Utc::now());
        });
        self.cancel.cancel();
        tracing::info!(job_id = %self.job_id, "Job status stream stopped");
    }

    /// True while the background task is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Resolve once the stream reached `complete`, `error`, or was stopped.
    pub async fn wait_until_finished(&self) -> StreamState {
        let mut rx = self.subscribe();
        let finished = rx.wait_for(StreamState::is_finished).await.map(|s| s.clone());
        match finished {
            Ok(state) => state,
            Err(_) => self.snapshot(),
        }
    }
}

impl Drop for JobStatusStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Task-side half of a stream: owns the socket and the reconnect timer.
struct Driver {
    job_id: String,
    url: String,
    reconnect_delay: Duration,
    transport: Arc<dyn StatusTransport>,
    state: Arc<watch::Sender<StreamState>>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self) {
        let mut conn: Option<Box<dyn StatusConnection>> = None;
        let mut pending = VecDeque::from([StreamInput::Start]);

        'run: loop {
            let input = match pending.pop_front() {
                Some(input) => input,
                None => {
                    let Some(open) = conn.as_mut() else {
                        // Nothing open and nothing scheduled: terminal or stopped.
                        break 'run;
                    };
                    let incoming = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break 'run,
                        incoming = open.recv() => incoming,
                    };
                    match incoming {
                        Incoming::Text(text) => {
                            self.queue_frames(&text, &mut pending);
                            continue 'run;
                        }
                        Incoming::Closed(reason) => {
                            conn = None;
                            StreamInput::Closed(reason)
                        }
                    }
                }
            };

            for effect in self.apply(input) {
                match effect {
                    StreamEffect::Connect => match self.connect().await {
                        Some(Ok(open)) => {
                            conn = Some(open);
                            pending.push_back(StreamInput::Opened);
                        }
                        Some(Err(e)) => {
                            tracing::error!(job_id = %self.job_id, error = %e, "Job stream connection failed");
                            pending.push_back(StreamInput::ConnectFailed(e.to_string()));
                        }
                        None => break 'run,
                    },
                    StreamEffect::CloseSocket => {
                        if let Some(mut open) = conn.take() {
                            open.close().await;
                        }
                    }
                    StreamEffect::ScheduleReconnect => {
                        tracing::warn!(
                            job_id = %self.job_id,
                            delay_ms = self.reconnect_delay.as_millis() as u64,
                            "Job stream dropped, reconnecting after delay",
                        );
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => break 'run,
                            _ = tokio::time::sleep(self.reconnect_delay) => {
                                pending.push_back(StreamInput::ReconnectDue);
                            }
                        }
                    }
                    // The timer only exists inside the select above, so
                    // cancelling the token is what disarms it.
                    StreamEffect::CancelReconnect => {}
                }
            }
        }

        if let Some(mut open) = conn.take() {
            open.close().await;
        }
        let final_state = self.state.borrow().connection();
        tracing::info!(job_id = %self.job_id, state = %final_state, "Job stream task exited");
    }

    /// Run one transition against the shared state and notify observers.
    fn apply(&self, input: StreamInput) -> Vec<StreamEffect> {
        let mut effects = Vec::new();
        self.state.send_modify(|state| {
            effects = state.apply(input, Utc::now());
        });
        effects
    }

    /// Open a connection unless cancelled first. `None` means cancelled.
    async fn connect(&self) -> Option<Result<Box<dyn StatusConnection>, TransportError>> {
        let attempt = self.state.borrow().attempts();
        tracing::info!(job_id = %self.job_id, url = %self.url, attempt, "Connecting to job stream");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.transport.connect(&self.url) => Some(result),
        }
    }

    /// Parse a text payload into inputs; malformed lines are only logged.
    fn queue_frames(&self, text: &str, pending: &mut VecDeque<StreamInput>) {
        for parsed in parse_frames(text) {
            match parsed {
                Ok(event) => {
                    tracing::debug!(job_id = %self.job_id, ?event, "Status frame received");
                    pending.push_back(StreamInput::Event(event));
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        error = %e,
                        raw_message = %text,
                        "Failed to parse status frame",
                    );
                }
            }
        }
    }
}
