use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Статус заказа в жизненном цикле оформления.
///
/// `Pending -> AwaitingPayment -> {Paid | Failed | Cancelled}`; из терминальных
/// статусов выхода нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Почему заказ закрыт как `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    GatewayNotFound,
    GatewayError,
    SeatLostDuringPayment,
}

/// Строка заказа: либо место с зафиксированной ценой, либо позиция меню.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    Seat {
        slot_id: i64,
        row: i32,
        number: i32,
        price: i64,
    },
    Food {
        food_id: i64,
        name: String,
        quantity: u32,
        unit_price: i64,
    },
}

/// Промокод, зафиксированный на заказе при применении скидки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedVoucher {
    pub id: i64,
    pub code: String,
    pub percent: u32,
}

/// Одна попытка оформления покупки.
///
/// Заказ — единственный носитель состояния между шагами оформления: клиент
/// передаёт только его идентификатор, сервер никогда не доверяет клиентским
/// копиям выбора.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub screening_id: i64,
    pub items: Vec<LineItem>,
    pub voucher: Option<AppliedVoucher>,
    pub points_redeemed: i64,
    pub total: i64,
    pub status: OrderStatus,
    pub failure_reason: Option<FailureReason>,
    /// Оплата получена, но заказ не может быть исполнен — деньги подлежат
    /// возврату вне ядра. Флаг для операторов.
    pub refund_eligible: bool,
    pub gateway_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: i64, screening_id: i64, items: Vec<LineItem>, total: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            screening_id,
            items,
            voucher: None,
            points_redeemed: 0,
            total,
            status: OrderStatus::Pending,
            failure_reason: None,
            refund_eligible: false,
            gateway_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seat_ids(&self) -> Vec<i64> {
        self.items
            .iter()
            .filter_map(|item| match item {
                LineItem::Seat { slot_id, .. } => Some(*slot_id),
                LineItem::Food { .. } => None,
            })
            .collect()
    }

    pub fn seat_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, LineItem::Seat { .. }))
            .count()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
