use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::models::{CalculationStatus, CalculationType};
use crate::db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Read-only JSON routes for polling batch status and reading results.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status/:season", get(status_handler))
        .route("/api/sos/:season", get(sos_handler))
        .route("/api/luck/:season", get(luck_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Status of every tracked calculation type, `not_started` when never run.
pub fn season_status(db: &Database, season: i32) -> anyhow::Result<Vec<CalculationStatus>> {
    let stored = db.list_calculation_status(season)?;
    Ok([CalculationType::Sos, CalculationType::Luck]
        .into_iter()
        .map(|kind| {
            stored
                .iter()
                .find(|s| s.calculation_type == kind)
                .cloned()
                .unwrap_or_else(|| CalculationStatus::not_started(kind, season))
        })
        .collect())
}

/// GET /api/status/:season
async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(season): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    season_status(&state.db, season)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/sos/:season
async fn sos_handler(
    State(state): State<Arc<AppState>>,
    Path(season): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_sos_records(season)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/luck/:season
async fn luck_handler(
    State(state): State<Arc<AppState>>,
    Path(season): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_luck_records(season)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
