//! Reports endpoint.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use custody_engine::Report;
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Override for the reference date (`YYYY-MM-DD`)
    pub today: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/reports", get(report))
}

/// GET /reports - Totals and loans due on or before today.
async fn report(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> Json<Report> {
    let today = query.today.unwrap_or_else(crate::today);
    let store = state.store.lock().await;
    Json(Report::build(&store.ledger(), &today))
}
