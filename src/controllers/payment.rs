use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::services::gateway::GatewayResultCode;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/payment", post(payment_webhook))
}

/// POST /api/webhook/payment — асинхронное уведомление шлюза.
///
/// Шлюзу всегда отвечаем, что уведомление получено: ретраит он сам, а
/// идемпотентность сверки гасит дубликаты. Ошибки сверки — наша забота,
/// не его.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let payment_id = payload["paymentId"].as_str().unwrap_or_default();
    let status = payload["status"].as_str().unwrap_or_default();

    tracing::info!("Webhook: payment_id={}, status={}", payment_id, status);

    let Some(code) = GatewayResultCode::from_status(status) else {
        // NEW и прочие промежуточные статусы действий не требуют
        tracing::debug!("Статус {} для платежа {} не требует действий", status, payment_id);
        return (StatusCode::OK, Json(json!({"received": true})));
    };

    match state.checkout.reconcile(payment_id, code) {
        Ok(order) => {
            tracing::info!("Платёж {} сверен: заказ {} -> {}", payment_id, order.id, order.status);
        }
        Err(e) => {
            // сверка не прошла (например, места потеряны) — алерт уже поднят
            // внутри, шлюзу это знать незачем
            tracing::warn!("Сверка платежа {} завершилась ошибкой: {}", payment_id, e);
        }
    }

    (StatusCode::OK, Json(json!({"received": true})))
}
