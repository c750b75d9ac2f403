//! Промокоды и баллы лояльности.
//!
//! Два инварианта, которые исходная система держала на уникальном индексе и
//! транзакции БД: промокод одноразов на пользователя, баланс баллов не бывает
//! отрицательным. Здесь оба держит один мьютекс: валидация и фиксация видят
//! согласованное состояние, фиксация — всё или ничего.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{AppliedVoucher, LoyaltyLedgerEntry, Voucher, VoucherRedemption};

pub struct VoucherLedger {
    inner: Mutex<LedgerInner>,
}

struct LedgerInner {
    vouchers: HashMap<String, Voucher>,
    redeemed: HashSet<(i64, i64)>,
    redemptions: Vec<VoucherRedemption>,
    entries: Vec<LoyaltyLedgerEntry>,
    balances: HashMap<i64, i64>,
    /// Заказы, по которым фиксация уже прошла. Повторная фиксация того же
    /// заказа — no-op: ретраи reconciliation не удваивают списания.
    committed: HashSet<Uuid>,
}

fn apply_entry(inner: &mut LedgerInner, entry: LoyaltyLedgerEntry) {
    *inner.balances.entry(entry.user_id).or_insert(0) += entry.delta;
    inner.entries.push(entry);
}

impl VoucherLedger {
    pub fn new(vouchers: Vec<Voucher>) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                vouchers: vouchers.into_iter().map(|v| (v.code.clone(), v)).collect(),
                redeemed: HashSet::new(),
                redemptions: Vec::new(),
                entries: Vec::new(),
                balances: HashMap::new(),
                committed: HashSet::new(),
            }),
        }
    }

    /// Начисление баллов вне покупки: стартовый баланс, акции.
    pub fn credit(&self, user_id: i64, points: i64, order_id: Option<Uuid>) {
        if points <= 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        apply_entry(
            &mut inner,
            LoyaltyLedgerEntry { user_id, delta: points, order_id, created_at: Utc::now() },
        );
    }

    /// Текущий баланс — сумма движений. Именно это число авторитетно, а не
    /// кешированное значение из внешнего сервиса пользователей.
    pub fn balance(&self, user_id: i64) -> i64 {
        self.inner
            .lock()
            .unwrap()
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn validate_voucher(&self, user_id: i64, code: &str) -> Result<Voucher, BookingError> {
        let inner = self.inner.lock().unwrap();
        let voucher = inner
            .vouchers
            .get(code)
            .ok_or(BookingError::VoucherNotFound)?;
        if voucher.is_expired(Utc::now()) {
            return Err(BookingError::VoucherExpired);
        }
        if inner.redeemed.contains(&(user_id, voucher.id)) {
            return Err(BookingError::VoucherAlreadyUsed);
        }
        Ok(voucher.clone())
    }

    pub fn validate_points(&self, user_id: i64, requested: i64) -> Result<(), BookingError> {
        let balance = self.balance(user_id);
        if requested > balance {
            return Err(BookingError::InsufficientPoints { requested, balance });
        }
        Ok(())
    }

    /// Фиксация скидок после успешной оплаты: запись об использовании
    /// промокода, списание баллов и начисление заработанных — одним шагом.
    ///
    /// Одноразовость промокода и неотрицательность баланса перепроверяются
    /// здесь же: между валидацией и оплатой другой заказ мог успеть первым.
    /// При конфликте не меняется ничего.
    pub fn commit(
        &self,
        user_id: i64,
        voucher: Option<&AppliedVoucher>,
        points_redeemed: i64,
        points_earned: i64,
        order_id: Uuid,
    ) -> Result<(), BookingError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.committed.contains(&order_id) {
            return Ok(());
        }
        if let Some(v) = voucher {
            if inner.redeemed.contains(&(user_id, v.id)) {
                return Err(BookingError::VoucherAlreadyUsed);
            }
        }
        let balance = inner.balances.get(&user_id).copied().unwrap_or(0);
        if points_redeemed > balance {
            return Err(BookingError::InsufficientPoints { requested: points_redeemed, balance });
        }

        let now = Utc::now();
        if let Some(v) = voucher {
            inner.redeemed.insert((user_id, v.id));
            inner.redemptions.push(VoucherRedemption {
                user_id,
                voucher_id: v.id,
                order_id,
                redeemed_at: now,
            });
        }
        if points_redeemed > 0 {
            apply_entry(
                &mut inner,
                LoyaltyLedgerEntry {
                    user_id,
                    delta: -points_redeemed,
                    order_id: Some(order_id),
                    created_at: now,
                },
            );
        }
        if points_earned > 0 {
            apply_entry(
                &mut inner,
                LoyaltyLedgerEntry {
                    user_id,
                    delta: points_earned,
                    order_id: Some(order_id),
                    created_at: now,
                },
            );
        }
        inner.committed.insert(order_id);
        info!(
            "ledger commit: user={} order={} points -{} +{} voucher={:?}",
            user_id,
            order_id,
            points_redeemed,
            points_earned,
            voucher.map(|v| v.code.as_str())
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn voucher(id: i64, code: &str, percent: u32, days: i64) -> Voucher {
        Voucher {
            id,
            code: code.to_string(),
            percent,
            valid_until: Utc::now() + Duration::days(days),
        }
    }

    fn applied(v: &Voucher) -> AppliedVoucher {
        AppliedVoucher { id: v.id, code: v.code.clone(), percent: v.percent }
    }

    #[test]
    fn validate_voucher_covers_all_failure_modes() {
        let save10 = voucher(1, "SAVE10", 10, 30);
        let stale = voucher(2, "STALE", 25, -1);
        let ledger = VoucherLedger::new(vec![save10.clone(), stale]);

        assert_eq!(
            ledger.validate_voucher(7, "NOPE").unwrap_err(),
            BookingError::VoucherNotFound
        );
        assert_eq!(
            ledger.validate_voucher(7, "STALE").unwrap_err(),
            BookingError::VoucherExpired
        );
        assert_eq!(ledger.validate_voucher(7, "SAVE10").unwrap().percent, 10);

        ledger
            .commit(7, Some(&applied(&save10)), 0, 0, Uuid::new_v4())
            .unwrap();
        assert_eq!(
            ledger.validate_voucher(7, "SAVE10").unwrap_err(),
            BookingError::VoucherAlreadyUsed
        );
        // другой пользователь тем же кодом пользоваться может
        assert!(ledger.validate_voucher(8, "SAVE10").is_ok());
    }

    #[test]
    fn points_validation_respects_balance() {
        let ledger = VoucherLedger::new(vec![]);
        ledger.credit(7, 100, None);

        assert!(ledger.validate_points(7, 100).is_ok());
        assert_eq!(
            ledger.validate_points(7, 101).unwrap_err(),
            BookingError::InsufficientPoints { requested: 101, balance: 100 }
        );
    }

    #[test]
    fn commit_is_idempotent_per_order() {
        let save10 = voucher(1, "SAVE10", 10, 30);
        let ledger = VoucherLedger::new(vec![save10.clone()]);
        ledger.credit(7, 100, None);

        let order = Uuid::new_v4();
        ledger.commit(7, Some(&applied(&save10)), 40, 14, order).unwrap();
        assert_eq!(ledger.balance(7), 74);

        // ретрай reconciliation того же заказа ничего не меняет
        ledger.commit(7, Some(&applied(&save10)), 40, 14, order).unwrap();
        assert_eq!(ledger.balance(7), 74);
    }

    #[test]
    fn voucher_single_use_across_racing_orders() {
        let save10 = voucher(1, "SAVE10", 10, 30);
        let ledger = VoucherLedger::new(vec![save10.clone()]);

        // оба заказа прошли валидацию до того, как первый зафиксировался
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        ledger.commit(7, Some(&applied(&save10)), 0, 10, first).unwrap();
        assert_eq!(
            ledger.commit(7, Some(&applied(&save10)), 0, 10, second).unwrap_err(),
            BookingError::VoucherAlreadyUsed
        );
        // проигравший заказ не получил и начисления — фиксация атомарна
        assert_eq!(ledger.balance(7), 10);
    }

    #[test]
    fn balance_never_goes_negative() {
        let ledger = VoucherLedger::new(vec![]);
        ledger.credit(7, 50, None);

        // два заказа по 40 баллов: второму не хватает
        ledger.commit(7, None, 40, 0, Uuid::new_v4()).unwrap();
        assert_eq!(
            ledger.commit(7, None, 40, 0, Uuid::new_v4()).unwrap_err(),
            BookingError::InsufficientPoints { requested: 40, balance: 10 }
        );
        assert_eq!(ledger.balance(7), 10);
    }

    #[test]
    fn earn_only_commit_credits_points() {
        let ledger = VoucherLedger::new(vec![]);
        ledger.commit(7, None, 0, 14, Uuid::new_v4()).unwrap();
        assert_eq!(ledger.balance(7), 14);
    }
}
