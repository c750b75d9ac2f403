use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Процентный промокод. Одноразовый на пользователя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub percent: u32,
    pub valid_until: DateTime<Utc>,
}

impl Voucher {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }
}

/// Факт использования промокода пользователем. Не более одной записи на пару
/// (пользователь, промокод); создаётся только при успешной оплате.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRedemption {
    pub user_id: i64,
    pub voucher_id: i64,
    pub order_id: Uuid,
    pub redeemed_at: DateTime<Utc>,
}

/// Движение баллов лояльности: отрицательная дельта — списание, положительная
/// — начисление. Текущий баланс — сумма дельт, и он не бывает отрицательным.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyLedgerEntry {
    pub user_id: i64,
    pub delta: i64,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
