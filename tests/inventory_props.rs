//! Свойства инвентаря мест под конкуренцией: на каждое место — не больше
//! одного победителя, проигравшие получают отказ целиком, состояние всегда
//! сходится с эталонной моделью.

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration;
use proptest::prelude::*;

use kinoplex::error::BookingError;
use kinoplex::inventory::SeatInventory;
use kinoplex::models::{SeatSlot, SeatStatus, SeatTier};

fn inventory_with_seats(ids: std::ops::RangeInclusive<i64>) -> SeatInventory {
    let inventory = SeatInventory::new();
    let slots = ids
        .map(|id| SeatSlot::new(id, 1, 1, id as i32, SeatTier::Standard, 80_000))
        .collect();
    inventory.register_screening(1, slots);
    inventory
}

#[test]
fn racing_holds_on_one_seat_have_exactly_one_winner() {
    let inventory = Arc::new(inventory_with_seats(1..=1));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (1..=8i64)
        .map(|owner| {
            let inventory = inventory.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                inventory.hold(1, &[1], owner, Duration::minutes(10))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "ровно один захват должен пройти");
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(BookingError::SeatUnavailable(_))));
    }

    // место в однозначном состоянии, владелец — победитель
    let snapshot = inventory.snapshot(1).unwrap();
    assert_eq!(snapshot[0].status, SeatStatus::Held);
    assert!(snapshot[0].hold_owner.is_some());
}

#[test]
fn racing_holds_on_overlapping_sets_never_split_a_batch() {
    let inventory = Arc::new(inventory_with_seats(1..=6));
    let barrier = Arc::new(Barrier::new(6));

    // пересекающиеся пакеты: каждый сосед делит место с предыдущим
    let requests: Vec<Vec<i64>> =
        vec![vec![1, 2], vec![2, 3], vec![3, 4], vec![4, 5], vec![5, 6], vec![6, 1]];

    let handles: Vec<_> = requests
        .into_iter()
        .enumerate()
        .map(|(i, seats)| {
            let inventory = inventory.clone();
            let barrier = barrier.clone();
            let owner = (i + 1) as i64;
            thread::spawn(move || {
                barrier.wait();
                (owner, seats.clone(), inventory.hold(1, &seats, owner, Duration::minutes(10)))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // победители не пересекаются по местам
    let mut claimed: HashMap<i64, i64> = HashMap::new();
    for (owner, seats, result) in &results {
        if result.is_ok() {
            for seat in seats {
                let previous = claimed.insert(*seat, *owner);
                assert!(previous.is_none(), "место {} захвачено дважды", seat);
            }
        }
    }

    // и состояние инвентаря согласно: каждый Held-слот принадлежит победителю
    for slot in inventory.snapshot(1).unwrap() {
        match slot.status {
            SeatStatus::Held => assert_eq!(slot.hold_owner, claimed.get(&slot.id).copied()),
            SeatStatus::Available => assert!(!claimed.contains_key(&slot.id)),
            SeatStatus::Sold => unreachable!("никто не подтверждал продажу"),
        }
    }
}

#[test]
fn release_then_hold_by_another_owner_always_succeeds() {
    let inventory = inventory_with_seats(1..=1);
    for round in 0..50 {
        let first = 100 + round;
        let second = 200 + round;
        inventory.hold(1, &[1], first, Duration::minutes(10)).unwrap();
        inventory.release(1, &[1], first).unwrap();
        inventory
            .hold(1, &[1], second, Duration::minutes(10))
            .expect("после release место обязано быть доступно");
        inventory.release(1, &[1], second).unwrap();
    }
}

proptest! {
    /// Случайные последовательности hold/release против эталонной модели
    /// "кому принадлежит место". Инвентарь обязан сходиться с моделью после
    /// каждой операции.
    #[test]
    fn hold_release_sequences_match_reference_model(
        ops in proptest::collection::vec(
            (1i64..=4, proptest::collection::vec(1i64..=6, 1..=4), proptest::bool::ANY),
            1..60,
        ),
    ) {
        let inventory = inventory_with_seats(1..=6);
        let mut model: HashMap<i64, Option<i64>> = (1..=6).map(|id| (id, None)).collect();

        for (owner, seats, is_hold) in ops {
            let mut wanted = seats.clone();
            wanted.sort_unstable();
            wanted.dedup();

            if is_hold {
                let expected_ok = wanted.iter().all(|s| model[s].is_none());
                let result = inventory.hold(1, &wanted, owner, Duration::minutes(10));
                prop_assert_eq!(result.is_ok(), expected_ok);
                if expected_ok {
                    for s in &wanted {
                        model.insert(*s, Some(owner));
                    }
                }
            } else {
                inventory.release(1, &wanted, owner).unwrap();
                for s in &wanted {
                    if model[s] == Some(owner) {
                        model.insert(*s, None);
                    }
                }
            }
        }

        for slot in inventory.snapshot(1).unwrap() {
            prop_assert_eq!(slot.hold_owner, model[&slot.id]);
            match model[&slot.id] {
                Some(_) => prop_assert_eq!(slot.status, SeatStatus::Held),
                None => prop_assert_eq!(slot.status, SeatStatus::Available),
            }
        }
    }

    /// Неудавшийся пакетный захват не оставляет следов: все места пакета
    /// остаются ровно в том состоянии, в котором были.
    #[test]
    fn failed_hold_leaves_no_partial_state(
        taken in proptest::collection::vec(1i64..=6, 1..=3),
        requested in proptest::collection::vec(1i64..=6, 2..=5),
    ) {
        let inventory = inventory_with_seats(1..=6);
        let mut taken = taken;
        taken.sort_unstable();
        taken.dedup();
        inventory.hold(1, &taken, 1, Duration::minutes(10)).unwrap();

        let mut requested = requested;
        requested.sort_unstable();
        requested.dedup();
        let overlaps = requested.iter().any(|s| taken.contains(s));
        prop_assume!(overlaps);

        let before = inventory.snapshot(1).unwrap();
        let err = inventory.hold(1, &requested, 2, Duration::minutes(10)).unwrap_err();
        prop_assert!(matches!(err, BookingError::SeatUnavailable(_)));

        let after = inventory.snapshot(1).unwrap();
        for (b, a) in before.iter().zip(after.iter()) {
            prop_assert_eq!(b.status, a.status);
            prop_assert_eq!(b.hold_owner, a.hold_owner);
        }
    }
}
