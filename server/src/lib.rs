//! Custody Server - data API, spreadsheet sync and cloud mirroring around
//! the custody-engine record store.
//!
//! The binary in `main.rs` wires these pieces together; they live in a
//! library so integration tests can build the same router.

pub mod cloud;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sheets;
pub mod storage;
pub mod websocket;

use crate::config::Config;
use crate::sheets::SyncController;
use crate::websocket::ConnectionManager;
use axum::Router;
use custody_engine::{RecordStore, Timestamp};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<RecordStore>>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
    /// Present when a spreadsheet endpoint is configured
    pub sync: Option<Arc<SyncController>>,
}

/// Build the application router with its layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Today's local date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
