//! Item routes and availability.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use custody_engine::{Item, ItemPatch, NewItem, Quantity};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{now_millis, AppState};

/// Free-text filter shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// An item with its current availability.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub available: Quantity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub item_name: String,
    pub available: Quantity,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", patch(update_item).delete(delete_item))
        .route("/availability/{item_name}", get(availability))
}

/// GET /items - Items sorted by name, optionally filtered.
async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ItemView>> {
    let store = state.store.lock().await;
    let ledger = store.ledger();
    let items = store
        .search_items(&query.q)
        .into_iter()
        .map(|item| ItemView {
            available: ledger.available_for(&item.name),
            item: item.clone(),
        })
        .collect();
    Json(items)
}

/// POST /items
async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>)> {
    let item = state.store.lock().await.add_item(payload, now_millis())?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /items/{id} - Only the fields present overwrite.
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<Item>> {
    let item = state
        .store
        .lock()
        .await
        .update_item(&id, patch, now_millis())?;
    Ok(Json(item))
}

/// DELETE /items/{id}
async fn delete_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.store.lock().await.delete_item(&id, now_millis())?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /availability/{item_name}
async fn availability(
    State(state): State<AppState>,
    Path(item_name): Path<String>,
) -> Json<AvailabilityResponse> {
    let available = state.store.lock().await.available_for(&item_name);
    Json(AvailabilityResponse {
        item_name,
        available,
    })
}
