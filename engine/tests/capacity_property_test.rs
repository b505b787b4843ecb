//! Property test for the capacity invariant.
//!
//! For any interleaving of guarded reserves and cancels, the committed
//! load of a concurrent resource never exceeds its capacity at any night,
//! and a from-scratch replay of the ledger agrees with the incrementally
//! folded state. The guard used here is exactly the coordinator's check:
//! refuse when `first_capacity_shortfall` reports one.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::{Days, NaiveDate, Utc};
use innkeep_core::event::LedgerEvent;
use innkeep_core::ids::{HolderId, ReservationId, ResourceId};
use innkeep_core::ledger::{RecordedEvent, Version};
use innkeep_core::window::TimeWindow;
use innkeep_engine::ResourceLoad;
use proptest::prelude::*;

const CAPACITY: u64 = 6;
const HORIZON_DAYS: u64 = 14;

#[derive(Clone, Debug)]
enum Op {
    /// Try to reserve `amount` over `[start, start + len)` days
    Reserve { start: u64, len: u64, amount: u64 },
    /// Cancel the n-th still-open reservation, if any
    Cancel { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..HORIZON_DAYS, 1..5u64, 1..=CAPACITY).prop_map(|(start, len, amount)| {
            Op::Reserve { start, len, amount }
        }),
        1 => (0..32usize).prop_map(|pick| Op::Cancel { pick }),
    ]
}

fn epoch() -> NaiveDate {
    "2024-06-01".parse().unwrap()
}

fn window(start: u64, len: u64) -> TimeWindow {
    let check_in = epoch().checked_add_days(Days::new(start)).unwrap();
    TimeWindow::Nights {
        check_in,
        check_out: check_in.checked_add_days(Days::new(len)).unwrap(),
    }
}

fn full_horizon() -> TimeWindow {
    window(0, HORIZON_DAYS + 8)
}

proptest! {
    #[test]
    fn committed_load_never_exceeds_capacity(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let now = Utc::now();
        let resource_id = ResourceId::new();
        let mut load = ResourceLoad::new();
        let mut history: Vec<RecordedEvent> = Vec::new();
        let mut open: Vec<ReservationId> = Vec::new();
        let mut version = Version::INITIAL;

        let record = |load: &mut ResourceLoad,
                          history: &mut Vec<RecordedEvent>,
                          version: &mut Version,
                          event: LedgerEvent| {
            *version = version.next();
            let recorded = RecordedEvent { version: *version, event };
            load.apply(&recorded);
            history.push(recorded);
        };

        for op in ops {
            match op {
                Op::Reserve { start, len, amount } => {
                    let window = window(start, len);
                    // The coordinator's guard: refuse on any shortfall
                    if load
                        .first_capacity_shortfall(&window, amount, CAPACITY, now)
                        .is_none()
                    {
                        let reservation_id = ReservationId::new();
                        record(&mut load, &mut history, &mut version, LedgerEvent::ReservationCommitted {
                            reservation_id,
                            resource_id,
                            holder_id: HolderId::new(),
                            window: Some(window),
                            amount,
                            committed_at: now,
                        });
                        open.push(reservation_id);
                    }
                }
                Op::Cancel { pick } => {
                    if open.is_empty() {
                        continue;
                    }
                    let reservation_id = open.remove(pick % open.len());
                    record(&mut load, &mut history, &mut version, LedgerEvent::ReservationCancelled {
                        reservation_id,
                        cancelled_at: now,
                    });
                }
            }

            // Invariant: no instant anywhere carries more than CAPACITY
            prop_assert!(load.committed_over(&full_horizon(), now) <= CAPACITY);
        }

        // Replay from scratch agrees with the incremental fold
        let mut replayed = ResourceLoad::new();
        for recorded in &history {
            replayed.apply(recorded);
        }
        prop_assert_eq!(
            replayed.committed_over(&full_horizon(), now),
            load.committed_over(&full_horizon(), now)
        );
        prop_assert_eq!(replayed.version(), load.version());
    }
}
