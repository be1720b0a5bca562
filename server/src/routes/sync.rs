//! Spreadsheet sync routes.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use custody_engine::SyncWatermark;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::sheets::{CycleOutcome, SyncController, SyncStatus};
use crate::AppState;

/// Body of a manual sync request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncRequest {
    /// Fetch even if the row count did not grow
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub configured: bool,
    #[serde(flatten)]
    pub status: Option<SyncStatus>,
    pub watermark: SyncWatermark,
}

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_now))
        .route("/sync/status", get(status))
        .route("/sync/start", post(start))
        .route("/sync/stop", post(stop))
}

fn controller(state: &AppState) -> Result<&Arc<SyncController>> {
    state
        .sync
        .as_ref()
        .ok_or_else(|| AppError::NotFound("spreadsheet sync is not configured".into()))
}

/// POST /sync - Run one cycle now. Answers 409 while another is in flight.
async fn sync_now(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CycleOutcome>> {
    let request: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    match controller(&state)?.sync_now(request.force).await? {
        CycleOutcome::Busy => Err(AppError::Busy),
        outcome => Ok(Json(outcome)),
    }
}

/// GET /sync/status
async fn status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    let watermark = *state.store.lock().await.watermark();
    Json(SyncStatusResponse {
        configured: state.sync.is_some(),
        status: state.sync.as_ref().map(|s| s.status()),
        watermark,
    })
}

/// POST /sync/start - Schedule the background loop.
async fn start(State(state): State<AppState>) -> Result<Json<SyncStatus>> {
    let controller = controller(&state)?;
    controller.start();
    Ok(Json(controller.status()))
}

/// POST /sync/stop - Stop scheduling cycles.
async fn stop(State(state): State<AppState>) -> Result<Json<SyncStatus>> {
    let controller = controller(&state)?;
    controller.stop();
    Ok(Json(controller.status()))
}
