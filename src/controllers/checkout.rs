use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{error_response, to_api_error, ApiResult};
use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(start_checkout))
        .route("/checkout/{order_id}/discount", patch(apply_discount))
        .route("/checkout/{order_id}/initiatePayment", patch(initiate_payment))
        .route("/checkout/{order_id}/cancel", patch(cancel_order))
        .route("/orders", get(get_user_orders))
        .route("/orders/{order_id}", get(get_order))
        .route("/loyalty/balance", get(get_loyalty_balance))
}

/* ---------- Request структуры ---------- */

#[derive(Debug, Deserialize, Validate)]
struct StartCheckoutRequest {
    #[validate(range(min = 1))]
    screening_id: i64,
    #[validate(length(min = 1, max = 10))]
    seat_ids: Vec<i64>,
    #[validate(nested)]
    #[serde(default)]
    food: Vec<FoodLine>,
}

#[derive(Debug, Deserialize, Validate)]
struct FoodLine {
    #[validate(range(min = 1))]
    food_id: i64,
    #[validate(range(min = 1, max = 20))]
    quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
struct DiscountRequest {
    #[validate(length(min = 1, max = 32))]
    voucher_code: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    points: i64,
}

fn validated<T: Validate>(req: &T) -> Result<(), (StatusCode, Json<super::ApiError>)> {
    req.validate()
        .map_err(|e| to_api_error(StatusCode::BAD_REQUEST, &e.to_string()))
}

/* ---------- Handlers ---------- */

// POST /api/checkout — шаг 1: бронь мест и создание заказа.
async fn start_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<StartCheckoutRequest>,
) -> ApiResult<impl IntoResponse> {
    validated(&req)?;
    let food_lines: Vec<(i64, u32)> = req.food.iter().map(|f| (f.food_id, f.quantity)).collect();
    let order = state
        .checkout
        .start_checkout(user.user_id, req.screening_id, &req.seat_ids, &food_lines)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(order)))
}

// PATCH /api/checkout/{order_id}/discount — шаг 2: промокод и баллы.
async fn apply_discount(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(req): Json<DiscountRequest>,
) -> ApiResult<impl IntoResponse> {
    validated(&req)?;
    let (order, quote) = state
        .checkout
        .apply_discount(order_id, user.user_id, req.voucher_code.as_deref(), req.points)
        .map_err(error_response)?;

    // скидки больше подытога — предупреждаем, но заказ остаётся в силе
    let warning = quote
        .clamped
        .then_some("Скидки превышают сумму заказа, итог прижат к нулю");
    Ok((
        StatusCode::OK,
        Json(json!({
            "order": order,
            "quote": quote,
            "warning": warning,
        })),
    ))
}

// PATCH /api/checkout/{order_id}/initiatePayment — шаг 3: платёж.
async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (order, redirect_url) = state
        .checkout
        .initiate_payment(order_id, user.user_id)
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "order_id": order.id,
            "payment_id": order.gateway_ref,
            "payment_url": redirect_url,
            "amount": order.total,
            "currency": "KZT",
        })),
    ))
}

// PATCH /api/checkout/{order_id}/cancel
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .checkout
        .cancel(order_id, user.user_id)
        .map_err(error_response)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Заказ отменён, места освобождены",
            "order": order,
        })),
    ))
}

// GET /api/orders
async fn get_user_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::OK, Json(state.orders.orders_for_user(user.user_id))))
}

// GET /api/orders/{order_id}
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let order = state
        .checkout
        .order(order_id, user.user_id)
        .map_err(error_response)?;
    Ok((StatusCode::OK, Json(order)))
}

// GET /api/loyalty/balance — авторитетный баланс из нашей книги, а не
// кешированное значение сервиса пользователей.
async fn get_loyalty_balance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok((
        StatusCode::OK,
        Json(json!({
            "user_id": user.user_id,
            "balance": state.ledger.balance(user.user_id),
        })),
    ))
}
