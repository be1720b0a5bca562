//! WebSocket upgrade route.

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::handlers::handle_websocket_connection;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Free-form label for logs
    pub client: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

/// GET /ws - Live change feed.
async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let client = query.client.unwrap_or_else(|| "anonymous".to_string());
    let manager = state.conn_manager.clone();
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, manager, client))
}
