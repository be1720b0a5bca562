//! Loan routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use custody_engine::{Loan, LoanStatus, NewLoan};

use super::inventory::SearchQuery;
use crate::error::Result;
use crate::{now_millis, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/loans", get(list_loans).post(create_loan))
        .route("/loans/{id}", delete(delete_loan))
}

/// GET /loans - Newest first, with returned and remaining quantities.
async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<LoanStatus>> {
    Json(state.store.lock().await.search_loans(&query.q))
}

/// POST /loans - Rejected when it would overdraw the item.
async fn create_loan(
    State(state): State<AppState>,
    Json(payload): Json<NewLoan>,
) -> Result<(StatusCode, Json<Loan>)> {
    let loan = state.store.lock().await.add_loan(payload, now_millis())?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// DELETE /loans/{id}
async fn delete_loan(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.store.lock().await.delete_loan(&id, now_millis())?;
    Ok(StatusCode::NO_CONTENT)
}
