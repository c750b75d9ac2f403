use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Жизненный цикл сеанса. Создание и перевод статусов делает модуль
/// расписания (вне ядра), ядро только читает.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningStatus {
    Available,
    Ended,
    Cancelled,
}

/// Показ фильма в конкретном зале в конкретное время.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screening {
    pub id: i64,
    pub movie_id: i64,
    pub movie_title: String,
    pub room_id: i64,
    pub starts_at: DateTime<Utc>,
    pub runtime_minutes: i32,
    pub status: ScreeningStatus,
}

impl Screening {
    pub fn is_sellable(&self) -> bool {
        self.status == ScreeningStatus::Available
    }
}
