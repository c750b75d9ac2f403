pub mod checkout;
pub mod payment;
pub mod screenings;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::error::BookingError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(screenings::routes())
        .merge(checkout::routes())
        .merge(payment::routes())
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
}

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) fn to_api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { success: false, message: message.to_string() }))
}

/// Конфликт ресурса: занятые места, заказ в неподходящем статусе.
pub(crate) fn status_419() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::CONFLICT)
}

/// Отображение ошибок ядра на HTTP-статусы и сообщения клиенту.
pub(crate) fn error_response(err: BookingError) -> (StatusCode, Json<ApiError>) {
    let (status, message) = match &err {
        BookingError::ScreeningNotFound(_) => (StatusCode::NOT_FOUND, "Сеанс не найден".to_string()),
        BookingError::ScreeningNotSellable(_) => {
            (StatusCode::CONFLICT, "Продажа билетов на этот сеанс закрыта".to_string())
        }
        BookingError::SeatUnavailable(ids) => {
            (status_419(), format!("Места уже заняты или недоступны: {:?}", ids))
        }
        BookingError::HoldExpiredOrMissing => {
            (status_419(), "Бронь мест истекла или отсутствует".to_string())
        }
        BookingError::FoodNotFound(_) => {
            (StatusCode::NOT_FOUND, "Позиция меню не найдена".to_string())
        }
        BookingError::VoucherNotFound => (StatusCode::NOT_FOUND, "Промокод не найден".to_string()),
        BookingError::VoucherExpired => {
            (StatusCode::GONE, "Срок действия промокода истёк".to_string())
        }
        BookingError::VoucherAlreadyUsed => {
            (StatusCode::CONFLICT, "Промокод уже был использован".to_string())
        }
        BookingError::InsufficientPoints { requested, balance } => (
            StatusCode::BAD_REQUEST,
            format!("Недостаточно баллов: запрошено {}, доступно {}", requested, balance),
        ),
        BookingError::OrderNotFound(_) | BookingError::UnknownGatewayReference(_) => {
            (StatusCode::NOT_FOUND, "Заказ не найден".to_string())
        }
        BookingError::Forbidden => {
            (StatusCode::FORBIDDEN, "Заказ не принадлежит вам".to_string())
        }
        BookingError::InvalidOrderState(status) => {
            (status_419(), format!("Заказ в статусе {} не принимает эту операцию", status))
        }
        BookingError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, (*msg).to_string()),
        BookingError::GatewayUnavailable(_) => (
            StatusCode::BAD_GATEWAY,
            "Платёжный шлюз недоступен. Повторите попытку позже.".to_string(),
        ),
        BookingError::SeatLostDuringPayment => (
            StatusCode::CONFLICT,
            "Места были потеряны во время оплаты. Платёж будет возвращён.".to_string(),
        ),
    };
    (status, Json(ApiError { success: false, message }))
}
