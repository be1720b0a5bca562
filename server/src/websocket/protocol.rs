//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use custody_engine::{ChangeEvent, ChangeKind, CollectionKind, MergeReport, Origin, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A record was committed; clients should re-read the collection.
    Changed {
        collection: CollectionKind,
        change: ChangeKind,
        id: RecordId,
        origin: Origin,
        timestamp: Timestamp,
    },

    /// A spreadsheet merge changed the inventory.
    Synced { report: MergeReport },

    /// A cloud snapshot replaced a collection.
    Snapshot { collection: CollectionKind },

    /// Response to ping.
    Pong,

    /// Error message.
    Error { message: String },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn changed(event: &ChangeEvent) -> Self {
        ServerMessage::Changed {
            collection: event.change.collection(),
            change: event.change.kind(),
            id: event.change.record_id().clone(),
            origin: event.origin,
            timestamp: event.timestamp,
        }
    }
}
