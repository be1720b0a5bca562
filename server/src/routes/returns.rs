//! Return routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use custody_engine::{NewReturn, Return};

use super::inventory::SearchQuery;
use crate::error::Result;
use crate::{now_millis, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/returns", get(list_returns).post(create_return))
        .route("/returns/{id}", delete(delete_return))
}

/// GET /returns - Newest first.
async fn list_returns(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Return>> {
    let store = state.store.lock().await;
    Json(store.search_returns(&query.q).into_iter().cloned().collect())
}

/// POST /returns - Linked returns may not exceed the loan's balance.
async fn create_return(
    State(state): State<AppState>,
    Json(payload): Json<NewReturn>,
) -> Result<(StatusCode, Json<Return>)> {
    let ret = state.store.lock().await.add_return(payload, now_millis())?;
    Ok((StatusCode::CREATED, Json(ret)))
}

/// DELETE /returns/{id}
async fn delete_return(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.store.lock().await.delete_return(&id, now_millis())?;
    Ok(StatusCode::NO_CONTENT)
}
