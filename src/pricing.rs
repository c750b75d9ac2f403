//! Расчёт стоимости заказа. Чистые функции без побочных эффектов: одинаковый
//! вход всегда даёт одинаковый итог.

use serde::Serialize;

use crate::models::LineItem;

/// Курс обмена баллов: 1 балл = 1 000 единиц валюты (100 баллов = 100 000).
pub const POINT_VALUE: i64 = 1_000;

/// За каждые 10 000 единиц итоговой суммы начисляется 1 балл.
pub const EARN_UNIT: i64 = 10_000;

/// Разложение итоговой суммы заказа.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub seat_subtotal: i64,
    pub food_subtotal: i64,
    pub subtotal: i64,
    pub voucher_discount: i64,
    pub point_discount: i64,
    pub total: i64,
    /// Скидки превысили подытог: итог прижат к нулю. Это предупреждение для
    /// вызывающего, не ошибка — заказ остаётся действительным.
    pub clamped: bool,
}

/// Считает итог: места + бар − промокод − баллы, не ниже нуля.
pub fn quote(items: &[LineItem], voucher_percent: Option<u32>, points_redeemed: i64) -> Quote {
    let mut seat_subtotal = 0i64;
    let mut food_subtotal = 0i64;
    for item in items {
        match item {
            LineItem::Seat { price, .. } => seat_subtotal += price,
            LineItem::Food { unit_price, quantity, .. } => {
                food_subtotal += unit_price * i64::from(*quantity);
            }
        }
    }
    let subtotal = seat_subtotal + food_subtotal;
    let voucher_discount = voucher_percent.map_or(0, |p| subtotal * i64::from(p) / 100);
    let point_discount = points_redeemed * POINT_VALUE;
    let raw = subtotal - voucher_discount - point_discount;
    Quote {
        seat_subtotal,
        food_subtotal,
        subtotal,
        voucher_discount,
        point_discount,
        total: raw.max(0),
        clamped: raw < 0,
    }
}

/// Сколько баллов начислить за завершённую покупку.
pub fn points_earned(total: i64) -> i64 {
    total / EARN_UNIT
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn seat(price: i64) -> LineItem {
        LineItem::Seat { slot_id: 1, row: 1, number: 1, price }
    }

    fn food(unit_price: i64, quantity: u32) -> LineItem {
        LineItem::Food {
            food_id: 1,
            name: "Попкорн".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn two_seats_with_ten_percent_voucher() {
        let items = vec![seat(80_000), seat(80_000)];
        let q = quote(&items, Some(10), 0);
        assert_eq!(q.subtotal, 160_000);
        assert_eq!(q.voucher_discount, 16_000);
        assert_eq!(q.total, 144_000);
        assert!(!q.clamped);
        assert_eq!(points_earned(q.total), 14);
    }

    #[test]
    fn food_lines_multiply_by_quantity() {
        let items = vec![seat(80_000), food(25_000, 2)];
        let q = quote(&items, None, 0);
        assert_eq!(q.seat_subtotal, 80_000);
        assert_eq!(q.food_subtotal, 50_000);
        assert_eq!(q.total, 130_000);
    }

    #[test]
    fn points_exchange_at_fixed_rate() {
        let items = vec![seat(80_000)];
        let q = quote(&items, None, 30);
        assert_eq!(q.point_discount, 30_000);
        assert_eq!(q.total, 50_000);
    }

    #[test]
    fn oversized_discount_clamps_to_zero() {
        let items = vec![seat(50_000)];
        let q = quote(&items, Some(50), 40);
        // 50 000 − 25 000 − 40 000 = −15 000 -> 0 с предупреждением
        assert_eq!(q.total, 0);
        assert!(q.clamped);
    }

    #[test]
    fn no_points_earned_below_earn_unit() {
        assert_eq!(points_earned(9_999), 0);
        assert_eq!(points_earned(10_000), 1);
        assert_eq!(points_earned(144_000), 14);
    }

    proptest! {
        #[test]
        fn quote_is_deterministic(
            prices in proptest::collection::vec(0i64..500_000, 0..6),
            percent in proptest::option::of(0u32..=100),
            points in 0i64..2_000,
        ) {
            let items: Vec<LineItem> = prices.iter().copied().map(seat).collect();
            let first = quote(&items, percent, points);
            let second = quote(&items, percent, points);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn total_never_negative_and_clamp_is_consistent(
            prices in proptest::collection::vec(0i64..500_000, 0..6),
            percent in proptest::option::of(0u32..=100),
            points in 0i64..2_000,
        ) {
            let items: Vec<LineItem> = prices.iter().copied().map(seat).collect();
            let q = quote(&items, percent, points);
            prop_assert!(q.total >= 0);
            let raw = q.subtotal - q.voucher_discount - q.point_discount;
            prop_assert_eq!(q.clamped, raw < 0);
            if !q.clamped {
                prop_assert_eq!(q.total, raw);
            }
        }

        #[test]
        fn no_discount_means_total_equals_subtotal(
            prices in proptest::collection::vec(0i64..500_000, 0..6),
        ) {
            let items: Vec<LineItem> = prices.iter().copied().map(seat).collect();
            let q = quote(&items, None, 0);
            prop_assert_eq!(q.total, q.subtotal);
            prop_assert!(!q.clamped);
        }
    }
}
