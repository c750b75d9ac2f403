use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;

/// Единая номенклатура ошибок ядра бронирования.
///
/// Все варианты возвращаются синхронно и не оставляют частичных изменений:
/// операция либо прошла целиком, либо состояние осталось прежним.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("screening {0} not found")]
    ScreeningNotFound(i64),

    #[error("screening {0} is not open for sale")]
    ScreeningNotSellable(i64),

    /// Хотя бы одно из запрошенных мест занято, продано или не существует.
    /// Ни одно место из пакета при этом не захвачено.
    #[error("seats unavailable: {0:?}")]
    SeatUnavailable(Vec<i64>),

    #[error("seat hold expired or missing")]
    HoldExpiredOrMissing,

    #[error("food item {0} not found")]
    FoodNotFound(i64),

    #[error("voucher not found")]
    VoucherNotFound,

    #[error("voucher expired")]
    VoucherExpired,

    #[error("voucher already used by this customer")]
    VoucherAlreadyUsed,

    #[error("insufficient points: requested {requested}, balance {balance}")]
    InsufficientPoints { requested: i64, balance: i64 },

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("unknown gateway reference {0}")]
    UnknownGatewayReference(String),

    #[error("order does not belong to the caller")]
    Forbidden,

    #[error("order is {0} and cannot accept this operation")]
    InvalidOrderState(OrderStatus),

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Шлюз подтвердил оплату, но бронь мест к этому моменту уже развалилась.
    /// Корректность инвентаря важнее успеха платежа, поэтому заказ закрывается
    /// как неуспешный и помечается к возврату средств.
    #[error("seats were lost while the payment was in flight")]
    SeatLostDuringPayment,
}
