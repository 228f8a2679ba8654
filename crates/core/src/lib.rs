//! Domain types and the pure status-stream state machine for the bulk
//! upload client. Nothing in this crate performs I/O.

pub mod config;
pub mod error;
pub mod status_events;
pub mod stream_state;
pub mod types;

pub use config::ClientConfig;
pub use error::UploadError;
