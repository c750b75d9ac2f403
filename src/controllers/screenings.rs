use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::{error_response, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/screenings", get(list_screenings))
        .route("/screenings/{id}/seats", get(get_seat_map))
        .route("/foods", get(list_foods))
}

// GET /api/screenings
async fn list_screenings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.catalog.list_screenings())
}

// GET /api/screenings/{id}/seats — схема зала для отрисовки.
// Сервер — единственный источник статусов мест; клиент только рисует.
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let seats = state.inventory.snapshot(id).map_err(error_response)?;
    Ok((StatusCode::OK, Json(seats)))
}

// GET /api/foods
async fn list_foods(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.catalog.list_foods())
}
