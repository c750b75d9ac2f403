//! Авторитетное состояние посадочных мест по сеансам.
//!
//! Исходная система держала резервы в Redis (`SET NX EX`) и дублировала
//! статус в строках БД; здесь то же самое выражено явно: по одному мьютексу
//! на сеанс, и любой захват пакета мест — одна атомарная секция. Побеждает
//! первый писатель, проигравший получает `SeatUnavailable` целиком, без
//! частично захваченных мест.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::BookingError;
use crate::models::{SeatSlot, SeatStatus};

#[derive(Default)]
pub struct SeatInventory {
    screenings: RwLock<HashMap<i64, Arc<Mutex<ScreeningSeats>>>>,
}

struct ScreeningSeats {
    slots: BTreeMap<i64, SeatSlot>,
}

impl ScreeningSeats {
    /// Ленивая уборка: просроченные брони возвращаются в продажу прямо во
    /// время чтения или захвата, отдельного таймера нет.
    fn expire_stale(&mut self, now: DateTime<Utc>) {
        let mut expired = 0usize;
        for slot in self.slots.values_mut() {
            if slot.status == SeatStatus::Held && slot.is_hold_expired(now) {
                slot.clear_hold();
                expired += 1;
            }
        }
        if expired > 0 {
            debug!("released {} expired seat holds", expired);
        }
    }
}

impl SeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заводит слоты сеанса. Вызывается при планировании сеанса, по одному
    /// слоту на каждое кресло зала.
    pub fn register_screening(&self, screening_id: i64, slots: Vec<SeatSlot>) {
        let seats = ScreeningSeats {
            slots: slots.into_iter().map(|s| (s.id, s)).collect(),
        };
        self.screenings
            .write()
            .unwrap()
            .insert(screening_id, Arc::new(Mutex::new(seats)));
    }

    fn screening(&self, id: i64) -> Result<Arc<Mutex<ScreeningSeats>>, BookingError> {
        self.screenings
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(BookingError::ScreeningNotFound(id))
    }

    /// Захватывает весь пакет мест разом: Available -> Held с владельцем и
    /// сроком `now + ttl`. Если хотя бы одно место занято (в том числе живой
    /// бронью того же владельца), продано или не существует — не меняется
    /// ничего. Возвращает захваченные слоты с зафиксированными ценами.
    pub fn hold(
        &self,
        screening_id: i64,
        seat_ids: &[i64],
        owner_id: i64,
        ttl: Duration,
    ) -> Result<Vec<SeatSlot>, BookingError> {
        let screening = self.screening(screening_id)?;
        let now = Utc::now();
        let mut seats = screening.lock().unwrap();
        seats.expire_stale(now);

        let mut wanted: Vec<i64> = seat_ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let mut blocked = Vec::new();
        for id in &wanted {
            match seats.slots.get(id) {
                Some(slot) if slot.status == SeatStatus::Available => {}
                _ => blocked.push(*id),
            }
        }
        if !blocked.is_empty() {
            return Err(BookingError::SeatUnavailable(blocked));
        }

        let expires_at = now + ttl;
        let mut held = Vec::with_capacity(wanted.len());
        for id in &wanted {
            if let Some(slot) = seats.slots.get_mut(id) {
                slot.status = SeatStatus::Held;
                slot.hold_owner = Some(owner_id);
                slot.hold_expires_at = Some(expires_at);
                held.push(slot.clone());
            }
        }
        Ok(held)
    }

    /// Снимает брони владельца: Held -> Available. Чужие и отсутствующие
    /// брони молча пропускаются, повторный вызов безвреден. Возвращает число
    /// реально освобождённых мест.
    pub fn release(
        &self,
        screening_id: i64,
        seat_ids: &[i64],
        owner_id: i64,
    ) -> Result<usize, BookingError> {
        let screening = self.screening(screening_id)?;
        let mut seats = screening.lock().unwrap();
        let mut released = 0usize;
        for id in seat_ids {
            if let Some(slot) = seats.slots.get_mut(id) {
                if slot.status == SeatStatus::Held && slot.hold_owner == Some(owner_id) {
                    slot.clear_hold();
                    released += 1;
                }
            }
        }
        Ok(released)
    }

    /// Единственный путь к продаже: Held -> Sold, и только если каждая бронь
    /// пакета жива и принадлежит владельцу. Проверка целиком до первой
    /// мутации — продажа не бывает частичной.
    pub fn confirm(
        &self,
        screening_id: i64,
        seat_ids: &[i64],
        owner_id: i64,
    ) -> Result<(), BookingError> {
        let screening = self.screening(screening_id)?;
        let now = Utc::now();
        let mut seats = screening.lock().unwrap();

        for id in seat_ids {
            let live = seats.slots.get(id).is_some_and(|slot| {
                slot.status == SeatStatus::Held
                    && slot.hold_owner == Some(owner_id)
                    && !slot.is_hold_expired(now)
            });
            if !live {
                return Err(BookingError::HoldExpiredOrMissing);
            }
        }
        for id in seat_ids {
            if let Some(slot) = seats.slots.get_mut(id) {
                slot.status = SeatStatus::Sold;
                slot.hold_owner = None;
                slot.hold_expires_at = None;
            }
        }
        Ok(())
    }

    /// Текущее состояние всех слотов сеанса для отрисовки схемы зала.
    /// Просроченные брони возвращаются в `Available` прямо при чтении.
    pub fn snapshot(&self, screening_id: i64) -> Result<Vec<SeatSlot>, BookingError> {
        let screening = self.screening(screening_id)?;
        let now = Utc::now();
        let mut seats = screening.lock().unwrap();
        seats.expire_stale(now);
        Ok(seats.slots.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatTier;

    fn inventory_with_seats(ids: &[i64]) -> SeatInventory {
        let inventory = SeatInventory::new();
        let slots = ids
            .iter()
            .map(|&id| SeatSlot::new(id, 1, 1, id as i32, SeatTier::Standard, 80_000))
            .collect();
        inventory.register_screening(1, slots);
        inventory
    }

    fn status_of(inventory: &SeatInventory, seat_id: i64) -> SeatStatus {
        inventory
            .snapshot(1)
            .unwrap()
            .into_iter()
            .find(|s| s.id == seat_id)
            .unwrap()
            .status
    }

    #[test]
    fn hold_is_all_or_nothing() {
        let inventory = inventory_with_seats(&[1, 2, 3]);
        inventory.hold(1, &[2], 100, Duration::minutes(10)).unwrap();

        // место 2 уже занято — пакет [1, 2] не должен тронуть место 1
        let err = inventory.hold(1, &[1, 2], 200, Duration::minutes(10)).unwrap_err();
        assert_eq!(err, BookingError::SeatUnavailable(vec![2]));
        assert_eq!(status_of(&inventory, 1), SeatStatus::Available);
    }

    #[test]
    fn same_owner_cannot_rehold_own_seat() {
        let inventory = inventory_with_seats(&[1, 2]);
        inventory.hold(1, &[1], 100, Duration::minutes(10)).unwrap();
        let err = inventory.hold(1, &[1, 2], 100, Duration::minutes(10)).unwrap_err();
        assert_eq!(err, BookingError::SeatUnavailable(vec![1]));
    }

    #[test]
    fn unknown_seat_blocks_whole_batch() {
        let inventory = inventory_with_seats(&[1]);
        let err = inventory.hold(1, &[1, 99], 100, Duration::minutes(10)).unwrap_err();
        assert_eq!(err, BookingError::SeatUnavailable(vec![99]));
        assert_eq!(status_of(&inventory, 1), SeatStatus::Available);
    }

    #[test]
    fn release_is_idempotent_and_skips_foreign_holds() {
        let inventory = inventory_with_seats(&[1, 2]);
        inventory.hold(1, &[1], 100, Duration::minutes(10)).unwrap();
        inventory.hold(1, &[2], 200, Duration::minutes(10)).unwrap();

        assert_eq!(inventory.release(1, &[1, 2], 100).unwrap(), 1);
        assert_eq!(status_of(&inventory, 1), SeatStatus::Available);
        assert_eq!(status_of(&inventory, 2), SeatStatus::Held);
        // повторный release — не ошибка
        assert_eq!(inventory.release(1, &[1, 2], 100).unwrap(), 0);
    }

    #[test]
    fn rehold_after_release_succeeds_for_new_owner() {
        let inventory = inventory_with_seats(&[1]);
        inventory.hold(1, &[1], 100, Duration::minutes(10)).unwrap();
        inventory.release(1, &[1], 100).unwrap();
        inventory.hold(1, &[1], 200, Duration::minutes(10)).unwrap();
        let snapshot = inventory.snapshot(1).unwrap();
        assert_eq!(snapshot[0].hold_owner, Some(200));
    }

    #[test]
    fn confirm_requires_live_hold_by_owner() {
        let inventory = inventory_with_seats(&[1]);
        inventory.hold(1, &[1], 100, Duration::minutes(10)).unwrap();

        assert_eq!(
            inventory.confirm(1, &[1], 200).unwrap_err(),
            BookingError::HoldExpiredOrMissing
        );
        inventory.confirm(1, &[1], 100).unwrap();
        assert_eq!(status_of(&inventory, 1), SeatStatus::Sold);

        // проданное место не отпускается и не перебронируется
        assert_eq!(inventory.release(1, &[1], 100).unwrap(), 0);
        assert!(inventory.hold(1, &[1], 300, Duration::minutes(10)).is_err());
    }

    #[test]
    fn expired_hold_fails_confirm_and_reads_as_available() {
        let inventory = inventory_with_seats(&[1]);
        // нулевой TTL: бронь мертва в момент создания
        inventory.hold(1, &[1], 100, Duration::zero()).unwrap();

        assert_eq!(
            inventory.confirm(1, &[1], 100).unwrap_err(),
            BookingError::HoldExpiredOrMissing
        );
        assert_eq!(status_of(&inventory, 1), SeatStatus::Available);

        // и другой покупатель свободно забирает место
        inventory.hold(1, &[1], 200, Duration::minutes(10)).unwrap();
    }

    #[test]
    fn expired_hold_is_available_for_next_hold() {
        let inventory = inventory_with_seats(&[1]);
        inventory.hold(1, &[1], 100, Duration::zero()).unwrap();
        // ленивое освобождение срабатывает в момент следующего захвата
        let held = inventory.hold(1, &[1], 200, Duration::minutes(10)).unwrap();
        assert_eq!(held[0].hold_owner, Some(200));
    }

    #[test]
    fn duplicate_seat_ids_collapse_into_one() {
        let inventory = inventory_with_seats(&[1]);
        let held = inventory.hold(1, &[1, 1, 1], 100, Duration::minutes(10)).unwrap();
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn unknown_screening_is_an_error() {
        let inventory = inventory_with_seats(&[1]);
        assert_eq!(
            inventory.hold(42, &[1], 100, Duration::minutes(10)).unwrap_err(),
            BookingError::ScreeningNotFound(42)
        );
    }
}
