//! Витрина каталога: сеансы, раскладка залов, меню бара.
//!
//! Каталог ведётся внешними модулями администрирования; ядро оформления его
//! только читает. Сервис стартует с прогретым каталогом так же, как исходная
//! система прогревала кеш при запуске.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Screening, ScreeningStatus, SeatSlot, SeatTier, Voucher};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

/// Read-only справочник для ядра оформления.
pub struct CatalogStore {
    screenings: HashMap<i64, Screening>,
    foods: BTreeMap<i64, FoodItem>,
}

impl CatalogStore {
    pub fn new(screenings: Vec<Screening>, foods: Vec<FoodItem>) -> Self {
        Self {
            screenings: screenings.into_iter().map(|s| (s.id, s)).collect(),
            foods: foods.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    pub fn screening(&self, id: i64) -> Option<Screening> {
        self.screenings.get(&id).cloned()
    }

    /// Сеансы, открытые для продажи, по времени начала.
    pub fn list_screenings(&self) -> Vec<Screening> {
        let mut list: Vec<Screening> = self
            .screenings
            .values()
            .filter(|s| s.is_sellable())
            .cloned()
            .collect();
        list.sort_by_key(|s| s.starts_at);
        list
    }

    pub fn food(&self, id: i64) -> Option<FoodItem> {
        self.foods.get(&id).cloned()
    }

    pub fn list_foods(&self) -> Vec<FoodItem> {
        self.foods.values().cloned().collect()
    }

    pub fn screening_count(&self) -> usize {
        self.screenings.len()
    }

    pub fn food_count(&self) -> usize {
        self.foods.len()
    }
}

/// Стартовые данные сервиса: каталог, посадочные слоты по сеансам, промокоды
/// и начальные балансы баллов.
pub struct Seed {
    pub catalog: CatalogStore,
    pub seats: Vec<(i64, Vec<SeatSlot>)>,
    pub vouchers: Vec<Voucher>,
    pub starting_points: Vec<(i64, i64)>,
}

/// Раскладка зала: по одному слоту на кресло. Первые ряды — Standard,
/// два последних — Vip. Идентификатор слота детерминирован:
/// `screening * 10_000 + row * 100 + number`.
pub fn room_layout(screening_id: i64, rows: i32, seats_per_row: i32) -> Vec<SeatSlot> {
    let mut slots = Vec::with_capacity((rows * seats_per_row) as usize);
    for row in 1..=rows {
        let (tier, price) = if row > rows - 2 {
            (SeatTier::Vip, 120_000)
        } else {
            (SeatTier::Standard, 80_000)
        };
        for number in 1..=seats_per_row {
            let id = screening_id * 10_000 + i64::from(row) * 100 + i64::from(number);
            slots.push(SeatSlot::new(id, screening_id, row, number, tier, price));
        }
    }
    slots
}

/// Демонстрационный каталог для локального запуска.
pub fn demo_seed() -> Seed {
    let now = Utc::now();
    let screenings = vec![
        Screening {
            id: 1,
            movie_id: 101,
            movie_title: "Межзвёздный экспресс".to_string(),
            room_id: 1,
            starts_at: now + Duration::hours(3),
            runtime_minutes: 142,
            status: ScreeningStatus::Available,
        },
        Screening {
            id: 2,
            movie_id: 102,
            movie_title: "Последний сеанс".to_string(),
            room_id: 2,
            starts_at: now + Duration::hours(6),
            runtime_minutes: 118,
            status: ScreeningStatus::Available,
        },
        Screening {
            id: 3,
            movie_id: 101,
            movie_title: "Межзвёздный экспресс".to_string(),
            room_id: 1,
            starts_at: now - Duration::hours(5),
            runtime_minutes: 142,
            status: ScreeningStatus::Ended,
        },
    ];

    let foods = vec![
        FoodItem { id: 1, name: "Попкорн большой".to_string(), price: 25_000 },
        FoodItem { id: 2, name: "Начос с сыром".to_string(), price: 30_000 },
        FoodItem { id: 3, name: "Кола 0.5".to_string(), price: 12_000 },
        FoodItem { id: 4, name: "Комбо на двоих".to_string(), price: 45_000 },
    ];

    let vouchers = vec![
        Voucher {
            id: 1,
            code: "SAVE10".to_string(),
            percent: 10,
            valid_until: now + Duration::days(365),
        },
        Voucher {
            id: 2,
            code: "OPENING20".to_string(),
            percent: 20,
            valid_until: now + Duration::days(30),
        },
        Voucher {
            id: 3,
            code: "LAUNCH25".to_string(),
            percent: 25,
            valid_until: now - Duration::days(1),
        },
    ];

    let seats = vec![
        (1, room_layout(1, 8, 10)),
        (2, room_layout(2, 6, 12)),
        (3, room_layout(3, 8, 10)),
    ];

    Seed {
        catalog: CatalogStore::new(screenings, foods),
        seats,
        vouchers,
        starting_points: vec![(1, 500), (2, 120)],
    }
}
