use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Sold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatTier {
    Standard,
    Vip,
    Couple,
}

/// Привязка одного физического места к одному сеансу.
///
/// Единица резервирования: на один слот в любой момент времени действует не
/// более одной живой брони или продажи. Слоты создаются при планировании
/// сеанса и никогда не удаляются — проданные остаются историей.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSlot {
    pub id: i64,
    pub screening_id: i64,
    pub row: i32,
    pub number: i32,
    pub tier: SeatTier,
    pub price: i64,
    pub status: SeatStatus,
    pub hold_owner: Option<i64>,
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl SeatSlot {
    pub fn new(id: i64, screening_id: i64, row: i32, number: i32, tier: SeatTier, price: i64) -> Self {
        Self {
            id,
            screening_id,
            row,
            number,
            tier,
            price,
            status: SeatStatus::Available,
            hold_owner: None,
            hold_expires_at: None,
        }
    }

    /// Бронь истекла, если срок наступил. `expires_at <= now`, поэтому бронь
    /// с нулевым TTL мертва сразу же.
    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.hold_expires_at, Some(expires_at) if expires_at <= now)
    }

    pub(crate) fn clear_hold(&mut self) {
        self.status = SeatStatus::Available;
        self.hold_owner = None;
        self.hold_expires_at = None;
    }
}
