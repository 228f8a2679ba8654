//! `ingest-client` library crate.
//!
//! Compresses CSV uploads, submits them to the backend, and follows the
//! resulting job over its WebSocket status channel. The binary
//! entrypoint lives in `main.rs`.

pub mod compressor;
pub mod controller;
pub mod stream;
pub mod submitter;
pub mod transport;

pub use compressor::{CompressedPayload, PayloadCompressor};
pub use controller::{UploadController, UploadView};
pub use stream::JobStatusStream;
pub use submitter::JobSubmitter;
pub use transport::{Incoming, StatusConnection, StatusTransport, TransportError, WsTransport};
