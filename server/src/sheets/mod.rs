//! Spreadsheet sync.
//!
//! The spreadsheet is reached through a small script endpoint. This module
//! owns the wire protocol, the transports, the background poller that feeds
//! rows to the engine's importer, and the outbound push of local changes.

mod client;
mod outbound;
mod poller;
mod protocol;
mod transport;

use std::time::Duration;

pub use client::SheetClient;
pub use outbound::{spawn_pusher, OutboundHook};
pub use poller::{CycleOutcome, SyncController, SyncStatus};
pub use protocol::*;
pub use transport::{
    default_transport, unwrap_callback, CallbackTransport, DirectTransport, FallbackTransport,
    Transport, CALLBACK_NAME,
};

/// Errors talking to the spreadsheet endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("endpoint rejected request: {0}")]
    Rejected(String),
}
