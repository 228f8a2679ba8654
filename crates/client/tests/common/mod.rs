#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ingest_client::{Incoming, JobStatusStream, StatusConnection, StatusTransport, TransportError};
use ingest_core::stream_state::StreamState;
use ingest_core::ClientConfig;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Config pointing at fake endpoints with the default 3s reconnect delay.
pub fn test_config() -> ClientConfig {
    ClientConfig::new("http://backend.test/api", "ws://backend.test/ws")
}

/// One recorded `connect` call.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub url: String,
    pub at: Instant,
}

enum Scripted {
    Accept {
        rx: mpsc::UnboundedReceiver<ServerMsg>,
        closed_by_client: Arc<AtomicBool>,
    },
    Refuse(String),
    Hang,
}

enum ServerMsg {
    Text(String),
    Close(Option<String>),
}

/// In-memory status transport. Each `connect` consumes the next scripted
/// outcome; unscripted attempts hang forever.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    script: VecDeque<Scripted>,
    attempts: Vec<Attempt>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next attempt to succeed; the returned handle plays the
    /// server side. Dropping it closes the connection uncleanly.
    pub fn accept(&self) -> FakeServer {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed_by_client = Arc::new(AtomicBool::new(false));
        self.inner.lock().unwrap().script.push_back(Scripted::Accept {
            rx,
            closed_by_client: Arc::clone(&closed_by_client),
        });
        FakeServer {
            tx,
            closed_by_client,
        }
    }

    /// Script the next attempt to fail to open.
    pub fn refuse(&self, reason: &str) {
        self.inner
            .lock()
            .unwrap()
            .script
            .push_back(Scripted::Refuse(reason.to_string()));
    }

    /// Script the next attempt to never resolve.
    pub fn hang(&self) {
        self.inner.lock().unwrap().script.push_back(Scripted::Hang);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.inner.lock().unwrap().attempts.clone()
    }
}

#[async_trait]
impl StatusTransport for FakeTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusConnection>, TransportError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner.attempts.push(Attempt {
                url: url.to_string(),
                at: Instant::now(),
            });
            inner.script.pop_front()
        };

        match next {
            Some(Scripted::Accept {
                rx,
                closed_by_client,
            }) => Ok(Box::new(FakeConnection {
                rx,
                closed_by_client,
            })),
            Some(Scripted::Refuse(reason)) => Err(TransportError::Connection(reason)),
            Some(Scripted::Hang) | None => futures::future::pending().await,
        }
    }
}

struct FakeConnection {
    rx: mpsc::UnboundedReceiver<ServerMsg>,
    closed_by_client: Arc<AtomicBool>,
}

#[async_trait]
impl StatusConnection for FakeConnection {
    async fn recv(&mut self) -> Incoming {
        match self.rx.recv().await {
            Some(ServerMsg::Text(text)) => Incoming::Text(text),
            Some(ServerMsg::Close(reason)) => Incoming::Closed(reason),
            None => Incoming::Closed(None),
        }
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
    }
}

/// Server side of one accepted fake connection.
pub struct FakeServer {
    tx: mpsc::UnboundedSender<ServerMsg>,
    closed_by_client: Arc<AtomicBool>,
}

impl FakeServer {
    pub fn send(&self, frame: &str) {
        let _ = self.tx.send(ServerMsg::Text(frame.to_string()));
    }

    /// Clean close with a reason.
    pub fn close(&self, reason: &str) {
        let _ = self.tx.send(ServerMsg::Close(Some(reason.to_string())));
    }

    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

/// Wait until the stream state satisfies `predicate`.
///
/// Fails the test instead of hanging if it never does.
pub async fn wait_for_state<F>(stream: &JobStatusStream, predicate: F) -> StreamState
where
    F: FnMut(&StreamState) -> bool,
{
    let mut rx = stream.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for stream state")
        .expect("stream state channel closed")
        .clone();
    state
}

/// Wait until the stream's background task has exited.
pub async fn wait_until_exited(stream: &JobStatusStream) {
    for _ in 0..1_000 {
        if !stream.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("stream task did not exit");
}
