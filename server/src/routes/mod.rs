//! HTTP route definitions.

mod health;
mod inventory;
mod loans;
mod reports;
mod returns;
mod sync;
mod ws;

use crate::AppState;
use axum::Router;

pub use inventory::{AvailabilityResponse, ItemView, SearchQuery};
pub use sync::{SyncRequest, SyncStatusResponse};

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(inventory::routes())
        .merge(loans::routes())
        .merge(returns::routes())
        .merge(reports::routes())
        .merge(sync::routes())
        .merge(ws::routes())
}
