//! Status channel transport.
//!
//! [`StatusTransport`] opens a per-job connection and
//! [`StatusConnection`] yields its text payloads. The production
//! implementation, [`WsTransport`], speaks WebSocket via
//! `tokio-tungstenite`; tests substitute an in-memory transport.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// What a live connection produced next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text payload (possibly several newline-delimited frames).
    Text(String),
    /// The connection ended, with a reason when one is known.
    Closed(Option<String>),
}

/// Opens status connections.
#[async_trait]
pub trait StatusTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusConnection>, TransportError>;
}

/// One open status connection.
#[async_trait]
pub trait StatusConnection: Send {
    /// Wait for the next payload. After [`Incoming::Closed`] the
    /// connection must not be polled again.
    async fn recv(&mut self) -> Incoming;

    /// Close the connection. Safe to call on an already-closed peer.
    async fn close(&mut self);
}

/// Errors that can occur when opening a status connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

/// A live WebSocket status connection.
pub struct WsConnection {
    url: String,
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl StatusTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusConnection>, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::debug!(url = %url, "Status WebSocket connected");

        Ok(Box::new(WsConnection {
            url: url.to_string(),
            ws_stream,
        }))
    }
}

#[async_trait]
impl StatusConnection for WsConnection {
    async fn recv(&mut self) -> Incoming {
        while let Some(msg_result) = self.ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Incoming::Text(text),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Incoming::Text(text),
                    Err(_) => {
                        tracing::trace!(url = %self.url, "Ignoring non-UTF-8 binary frame");
                    }
                },
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(url = %self.url, ?frame, "Status WebSocket closed by peer");
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    return Incoming::Closed(reason);
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Status WebSocket receive error");
                    return Incoming::Closed(Some(e.to_string()));
                }
            }
        }
        Incoming::Closed(None)
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(url = %self.url, error = %e, "Status WebSocket close failed");
        }
    }
}
