//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and fans change notifications out to
//! them.

use std::sync::Arc;

use custody_engine::{ChangeEvent, ChangeHook, HookError};
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Label the client supplied when connecting
    pub client: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<String, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection and return its id.
    pub fn register(&self, client: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                id: conn_id.clone(),
                client,
                sender,
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");
        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            tracing::info!(conn_id = %conn_id, client = %conn.client, "WebSocket connection unregistered");
        }
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        let sent = self
            .connections
            .iter()
            .filter(|entry| entry.value().sender.send(message.clone()).is_ok())
            .count();

        tracing::trace!(recipients = sent, "broadcast to connections");
        sent
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        self.connections
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Change hook that announces every committed mutation to connected clients.
pub struct LiveFeedHook {
    manager: Arc<ConnectionManager>,
}

impl LiveFeedHook {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl ChangeHook for LiveFeedHook {
    fn name(&self) -> &str {
        "live-feed"
    }

    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), HookError> {
        self.manager.broadcast_all(ServerMessage::changed(event));
        Ok(())
    }
}
