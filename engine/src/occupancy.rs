//! Authoritative per-resource state folded from the ledger.
//!
//! Under the per-resource lock the coordinator replays the resource's
//! stream (starting from the stock snapshot when one exists) into a
//! [`ResourceLoad`] and asks it the capacity questions. This fold is the
//! only state a commit decision may trust; the availability index answers
//! the same questions cheaply but tolerates staleness.
//!
//! Check-on-read expiry is applied here: a pending hold past its deadline
//! stops counting against capacity the moment it is read, whether or not
//! the sweeper has recorded the expiry yet.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use innkeep_core::event::{LedgerEvent, StockMovement};
use innkeep_core::ids::{HolderId, ReservationId};
use innkeep_core::ledger::{RecordedEvent, Version};
use innkeep_core::reservation::{Reservation, ReservationStatus};
use innkeep_core::window::TimeWindow;
use serde::{Deserialize, Serialize};

/// A point on a resource's time axis, at the resource's granularity.
#[derive(Clone, Copy, Debug)]
enum Instant {
    Night(NaiveDate),
    At(DateTime<Utc>),
}

fn covers(window: &TimeWindow, instant: Instant) -> bool {
    match (window, instant) {
        (
            TimeWindow::Nights {
                check_in,
                check_out,
            },
            Instant::Night(night),
        ) => *check_in <= night && night < *check_out,
        (TimeWindow::Slot { starts_at, ends_at }, Instant::At(at)) => {
            *starts_at <= at && at < *ends_at
        }
        _ => false,
    }
}

const fn start_instant(window: &TimeWindow) -> Instant {
    match window {
        TimeWindow::Nights { check_in, .. } => Instant::Night(*check_in),
        TimeWindow::Slot { starts_at, .. } => Instant::At(*starts_at),
    }
}

/// Compaction payload for a resource: running stock plus every open
/// reservation, so a replay from the snapshot version is exact.
///
/// Encoded with bincode by the coordinator's compaction pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// Stock on hand at the snapshot version
    pub current_stock: u64,
    /// Open reservations in creation order, each with its un-released
    /// remainder
    pub open: Vec<(Reservation, u64)>,
}

/// Per-resource state folded from the ledger.
#[derive(Clone, Debug, Default)]
pub struct ResourceLoad {
    version: Version,
    reservations: HashMap<ReservationId, Reservation>,
    order: Vec<ReservationId>,
    remaining: HashMap<ReservationId, u64>,
    current_stock: u64,
}

impl ResourceLoad {
    /// Empty state for a resource with no snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from a compaction snapshot; events after
    /// `version` are applied on top with [`Self::apply`].
    #[must_use]
    pub fn from_snapshot(version: Version, snapshot: StockSnapshot) -> Self {
        let mut load = Self {
            version,
            current_stock: snapshot.current_stock,
            ..Self::default()
        };
        for (reservation, remaining) in snapshot.open {
            load.order.push(reservation.reservation_id);
            load.remaining
                .insert(reservation.reservation_id, remaining);
            load.reservations
                .insert(reservation.reservation_id, reservation);
        }
        load
    }

    /// Ledger version this state has folded up to.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Looks up a reservation by id.
    #[must_use]
    pub fn reservation(&self, reservation_id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(reservation_id)
    }

    /// Folds one recorded event into the state.
    pub fn apply(&mut self, recorded: &RecordedEvent) {
        self.version = recorded.version;
        match &recorded.event {
            LedgerEvent::ReservationHeld {
                reservation_id,
                resource_id,
                holder_id,
                window,
                amount,
                expires_at,
                held_at,
            } => {
                self.insert_reservation(Reservation {
                    reservation_id: *reservation_id,
                    resource_id: *resource_id,
                    holder_id: *holder_id,
                    window: *window,
                    amount: *amount,
                    status: ReservationStatus::Pending,
                    created_at: *held_at,
                    expires_at: Some(*expires_at),
                    version: recorded.version.value(),
                });
            }

            LedgerEvent::ReservationCommitted {
                reservation_id,
                resource_id,
                holder_id,
                window,
                amount,
                committed_at,
            } => {
                self.insert_reservation(Reservation {
                    reservation_id: *reservation_id,
                    resource_id: *resource_id,
                    holder_id: *holder_id,
                    window: *window,
                    amount: *amount,
                    status: ReservationStatus::Confirmed,
                    created_at: *committed_at,
                    expires_at: None,
                    version: recorded.version.value(),
                });
            }

            LedgerEvent::ReservationConfirmed { reservation_id, .. } => {
                if let Some(reservation) = self.reservations.get_mut(reservation_id) {
                    reservation.status = ReservationStatus::Confirmed;
                    reservation.expires_at = None;
                    reservation.version = recorded.version.value();
                }
            }

            LedgerEvent::ReservationCancelled { reservation_id, .. } => {
                self.close_reservation(reservation_id, ReservationStatus::Cancelled, recorded);
            }
            LedgerEvent::ReservationReleased { reservation_id, .. } => {
                self.close_reservation(reservation_id, ReservationStatus::Released, recorded);
            }
            LedgerEvent::ReservationExpired { reservation_id, .. } => {
                self.close_reservation(reservation_id, ReservationStatus::Expired, recorded);
            }

            LedgerEvent::StockReleased {
                holder_id, amount, ..
            } => self.drain_holder_stock(*holder_id, *amount),

            LedgerEvent::StockRecorded { movement, .. } => match movement {
                StockMovement::Load(units) => {
                    self.current_stock = self.current_stock.saturating_add(*units);
                }
                StockMovement::Waste(units) => {
                    self.current_stock = self.current_stock.saturating_sub(*units);
                }
                StockMovement::Adjust(delta) => {
                    self.current_stock = self.current_stock.saturating_add_signed(*delta);
                }
            },
        }
    }

    fn insert_reservation(&mut self, reservation: Reservation) {
        let id = reservation.reservation_id;
        // Idempotent on replay: a re-delivered creation event is a no-op
        if self.reservations.contains_key(&id) {
            return;
        }
        self.order.push(id);
        self.remaining.insert(id, reservation.amount);
        self.reservations.insert(id, reservation);
    }

    fn close_reservation(
        &mut self,
        reservation_id: &ReservationId,
        status: ReservationStatus,
        recorded: &RecordedEvent,
    ) {
        if let Some(reservation) = self.reservations.get_mut(reservation_id) {
            reservation.status = status;
            reservation.version = recorded.version.value();
            self.remaining.insert(*reservation_id, 0);
        }
    }

    /// Greedy oldest-first drain of a holder's reserved stock. Validation
    /// against the holder's outstanding amount happened before the event
    /// was appended; the fold applies it saturating.
    fn drain_holder_stock(&mut self, holder_id: HolderId, amount: u64) {
        let mut left = amount;
        for id in &self.order {
            if left == 0 {
                break;
            }
            let Some(reservation) = self.reservations.get(id) else {
                continue;
            };
            if reservation.holder_id != holder_id
                || reservation.window.is_some()
                || reservation.status.is_terminal()
            {
                continue;
            }
            if let Some(remaining) = self.remaining.get_mut(id) {
                let taken = (*remaining).min(left);
                *remaining -= taken;
                left -= taken;
            }
        }
    }

    fn live(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.holds_capacity_at(now))
    }

    /// Committed load at one instant, summed over live reservations.
    fn committed_at(&self, instant: Instant, now: DateTime<Utc>) -> u64 {
        self.live(now)
            .filter(|r| r.window.as_ref().is_some_and(|w| covers(w, instant)))
            .map(|r| r.amount)
            .sum()
    }

    /// Interval-based conflict scan for exclusive resources: any live
    /// overlap is a conflict. Returns the first conflicting night for
    /// stays, or the already-committed slot for slotted resources.
    #[must_use]
    pub fn first_exclusive_conflict(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Option<TimeWindow> {
        let mut earliest_night: Option<NaiveDate> = None;
        for reservation in self.live(now) {
            let Some(committed) = reservation.window.as_ref() else {
                continue;
            };
            if !window.overlaps(committed) {
                continue;
            }
            match window.first_overlap_night(committed) {
                Some(night) => {
                    earliest_night =
                        Some(earliest_night.map_or(night, |current| current.min(night)));
                }
                // Slot granularity: the committed slot itself names the conflict
                None => return Some(*committed),
            }
        }
        earliest_night.map(TimeWindow::single_night)
    }

    /// Counter-based shortfall scan for concurrent resources. Returns the
    /// first night (or the slot) where `committed + amount` would exceed
    /// `limit`, along with the free capacity at that point.
    #[must_use]
    pub fn first_capacity_shortfall(
        &self,
        window: &TimeWindow,
        amount: u64,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Option<(TimeWindow, u64)> {
        match window {
            TimeWindow::Nights { .. } => {
                for night in window.nights() {
                    let committed = self.committed_at(Instant::Night(night), now);
                    if committed + amount > limit {
                        return Some((
                            TimeWindow::single_night(night),
                            limit.saturating_sub(committed),
                        ));
                    }
                }
                None
            }
            TimeWindow::Slot { starts_at, ends_at } => {
                // The instantaneous maximum inside a half-open window is
                // reached at the window start or at the start of some
                // overlapping reservation.
                let mut instants = vec![*starts_at];
                for reservation in self.live(now) {
                    if let Some(TimeWindow::Slot {
                        starts_at: other, ..
                    }) = reservation.window
                    {
                        if other > *starts_at && other < *ends_at {
                            instants.push(other);
                        }
                    }
                }
                for at in instants {
                    let committed = self.committed_at(Instant::At(at), now);
                    if committed + amount > limit {
                        return Some((*window, limit.saturating_sub(committed)));
                    }
                }
                None
            }
        }
    }

    /// Minimum free capacity across the window given an occupancy limit.
    #[must_use]
    pub fn free_over(&self, window: &TimeWindow, limit: u64, now: DateTime<Utc>) -> u64 {
        match window {
            TimeWindow::Nights { .. } => window
                .nights()
                .map(|night| limit.saturating_sub(self.committed_at(Instant::Night(night), now)))
                .min()
                .unwrap_or(0),
            TimeWindow::Slot { starts_at, ends_at } => {
                let mut instants = vec![*starts_at];
                for reservation in self.live(now) {
                    if let Some(TimeWindow::Slot {
                        starts_at: other, ..
                    }) = reservation.window
                    {
                        if other > *starts_at && other < *ends_at {
                            instants.push(other);
                        }
                    }
                }
                instants
                    .into_iter()
                    .map(|at| limit.saturating_sub(self.committed_at(Instant::At(at), now)))
                    .min()
                    .unwrap_or(limit)
            }
        }
    }

    /// Maximum instantaneous committed load inside a window.
    #[must_use]
    pub fn committed_over(&self, window: &TimeWindow, now: DateTime<Utc>) -> u64 {
        match window {
            TimeWindow::Nights { .. } => window
                .nights()
                .map(|night| self.committed_at(Instant::Night(night), now))
                .max()
                .unwrap_or(0),
            TimeWindow::Slot { starts_at, ends_at } => {
                let mut instants = vec![*starts_at];
                for reservation in self.live(now) {
                    if let Some(TimeWindow::Slot {
                        starts_at: other, ..
                    }) = reservation.window
                    {
                        if other > *starts_at && other < *ends_at {
                            instants.push(other);
                        }
                    }
                }
                instants
                    .into_iter()
                    .map(|at| self.committed_at(Instant::At(at), now))
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Peak instantaneous committed load anywhere on the time axis. Used
    /// by the catalog to refuse capacity decreases below it.
    #[must_use]
    pub fn peak_committed(&self, now: DateTime<Utc>) -> u64 {
        self.live(now)
            .filter_map(|r| r.window.as_ref())
            .map(|w| self.committed_at(start_instant(w), now))
            .max()
            .unwrap_or(0)
    }

    /// Stock on hand (loads minus waste plus adjustments).
    #[must_use]
    pub const fn stock_on_hand(&self) -> u64 {
        self.current_stock
    }

    /// Stock reserved by live quantity reservations, net of partial
    /// returns.
    #[must_use]
    pub fn reserved_stock(&self, now: DateTime<Utc>) -> u64 {
        self.live(now)
            .filter(|r| r.window.is_none())
            .map(|r| self.remaining.get(&r.reservation_id).copied().unwrap_or(0))
            .sum()
    }

    /// `current_stock - reserved_stock`.
    #[must_use]
    pub fn stock_available(&self, now: DateTime<Utc>) -> u64 {
        self.current_stock.saturating_sub(self.reserved_stock(now))
    }

    /// A holder's outstanding reserved stock, the bound a release is
    /// validated against.
    #[must_use]
    pub fn holder_outstanding(&self, holder_id: HolderId, now: DateTime<Utc>) -> u64 {
        self.live(now)
            .filter(|r| r.window.is_none() && r.holder_id == holder_id)
            .map(|r| self.remaining.get(&r.reservation_id).copied().unwrap_or(0))
            .sum()
    }

    /// Compaction payload covering this state's version.
    #[must_use]
    pub fn snapshot(&self) -> StockSnapshot {
        let open = self
            .order
            .iter()
            .filter_map(|id| {
                let reservation = self.reservations.get(id)?;
                if reservation.status.is_terminal() {
                    return None;
                }
                let remaining = self.remaining.get(id).copied().unwrap_or(0);
                Some((reservation.clone(), remaining))
            })
            .collect();
        StockSnapshot {
            current_stock: self.current_stock,
            open,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use innkeep_core::ids::ResourceId;

    fn record(version: u64, event: LedgerEvent) -> RecordedEvent {
        RecordedEvent {
            version: Version::new(version),
            event,
        }
    }

    fn committed_stay(
        resource_id: ResourceId,
        check_in: &str,
        check_out: &str,
        amount: u64,
    ) -> (ReservationId, LedgerEvent) {
        let reservation_id = ReservationId::new();
        let event = LedgerEvent::ReservationCommitted {
            reservation_id,
            resource_id,
            holder_id: HolderId::new(),
            window: Some(TimeWindow::Nights {
                check_in: check_in.parse().unwrap(),
                check_out: check_out.parse().unwrap(),
            }),
            amount,
            committed_at: Utc::now(),
        };
        (reservation_id, event)
    }

    #[test]
    fn exclusive_conflict_names_first_shared_night() {
        let resource_id = ResourceId::new();
        let mut load = ResourceLoad::new();
        let (_, event) = committed_stay(resource_id, "2024-06-01", "2024-06-03", 1);
        load.apply(&record(1, event));

        let request = TimeWindow::Nights {
            check_in: "2024-06-02".parse().unwrap(),
            check_out: "2024-06-04".parse().unwrap(),
        };
        let conflict = load.first_exclusive_conflict(&request, Utc::now()).unwrap();
        assert_eq!(
            conflict,
            TimeWindow::single_night("2024-06-02".parse().unwrap())
        );

        let free_request = TimeWindow::Nights {
            check_in: "2024-06-03".parse().unwrap(),
            check_out: "2024-06-05".parse().unwrap(),
        };
        assert!(load
            .first_exclusive_conflict(&free_request, Utc::now())
            .is_none());
    }

    #[test]
    fn cancelled_reservation_releases_capacity() {
        let resource_id = ResourceId::new();
        let mut load = ResourceLoad::new();
        let (reservation_id, event) = committed_stay(resource_id, "2024-06-01", "2024-06-03", 1);
        load.apply(&record(1, event));
        load.apply(&record(
            2,
            LedgerEvent::ReservationCancelled {
                reservation_id,
                cancelled_at: Utc::now(),
            },
        ));

        let request = TimeWindow::Nights {
            check_in: "2024-06-01".parse().unwrap(),
            check_out: "2024-06-03".parse().unwrap(),
        };
        assert!(load
            .first_exclusive_conflict(&request, Utc::now())
            .is_none());
    }

    #[test]
    fn concurrent_shortfall_reports_free_capacity() {
        let resource_id = ResourceId::new();
        let mut load = ResourceLoad::new();
        let (_, a) = committed_stay(resource_id, "2024-06-01", "2024-06-04", 3);
        let (_, b) = committed_stay(resource_id, "2024-06-02", "2024-06-03", 4);
        load.apply(&record(1, a));
        load.apply(&record(2, b));

        // June 2 carries 7 of 10; asking for 4 more overflows there
        let request = TimeWindow::Nights {
            check_in: "2024-06-01".parse().unwrap(),
            check_out: "2024-06-04".parse().unwrap(),
        };
        let (window, available) = load
            .first_capacity_shortfall(&request, 4, 10, Utc::now())
            .unwrap();
        assert_eq!(
            window,
            TimeWindow::single_night("2024-06-02".parse().unwrap())
        );
        assert_eq!(available, 3);

        assert!(load
            .first_capacity_shortfall(&request, 3, 10, Utc::now())
            .is_none());
        assert_eq!(load.free_over(&request, 10, Utc::now()), 3);
    }

    #[test]
    fn expired_hold_stops_counting_on_read() {
        let resource_id = ResourceId::new();
        let now = Utc::now();
        let mut load = ResourceLoad::new();
        load.apply(&record(
            1,
            LedgerEvent::ReservationHeld {
                reservation_id: ReservationId::new(),
                resource_id,
                holder_id: HolderId::new(),
                window: Some(TimeWindow::Nights {
                    check_in: "2024-06-01".parse().unwrap(),
                    check_out: "2024-06-02".parse().unwrap(),
                }),
                amount: 1,
                expires_at: now - chrono::Duration::seconds(1),
                held_at: now - chrono::Duration::seconds(60),
            },
        ));

        let request = TimeWindow::Nights {
            check_in: "2024-06-01".parse().unwrap(),
            check_out: "2024-06-02".parse().unwrap(),
        };
        // The expiry has not been recorded, yet the hold no longer blocks
        assert!(load.first_exclusive_conflict(&request, now).is_none());
    }

    #[test]
    fn stock_totals_follow_movements_and_releases() {
        let resource_id = ResourceId::new();
        let holder_id = HolderId::new();
        let now = Utc::now();
        let mut load = ResourceLoad::new();

        load.apply(&record(
            1,
            LedgerEvent::StockRecorded {
                resource_id,
                movement: StockMovement::Load(40),
                recorded_at: now,
            },
        ));
        let reservation_id = ReservationId::new();
        load.apply(&record(
            2,
            LedgerEvent::ReservationCommitted {
                reservation_id,
                resource_id,
                holder_id,
                window: None,
                amount: 15,
                committed_at: now,
            },
        ));
        load.apply(&record(
            3,
            LedgerEvent::StockRecorded {
                resource_id,
                movement: StockMovement::Waste(5),
                recorded_at: now,
            },
        ));
        load.apply(&record(
            4,
            LedgerEvent::StockReleased {
                resource_id,
                holder_id,
                amount: 6,
                released_at: now,
            },
        ));

        assert_eq!(load.stock_on_hand(), 35);
        assert_eq!(load.reserved_stock(now), 9);
        assert_eq!(load.stock_available(now), 26);
        assert_eq!(load.holder_outstanding(holder_id, now), 9);
    }

    #[test]
    fn snapshot_round_trips_open_state() {
        let resource_id = ResourceId::new();
        let holder_id = HolderId::new();
        let now = Utc::now();
        let mut load = ResourceLoad::new();

        load.apply(&record(
            1,
            LedgerEvent::StockRecorded {
                resource_id,
                movement: StockMovement::Load(20),
                recorded_at: now,
            },
        ));
        load.apply(&record(
            2,
            LedgerEvent::ReservationCommitted {
                reservation_id: ReservationId::new(),
                resource_id,
                holder_id,
                window: None,
                amount: 8,
                committed_at: now,
            },
        ));

        let restored = ResourceLoad::from_snapshot(load.version(), load.snapshot());
        assert_eq!(restored.version(), Version::new(2));
        assert_eq!(restored.stock_on_hand(), 20);
        assert_eq!(restored.reserved_stock(now), 8);
        assert_eq!(restored.holder_outstanding(holder_id, now), 8);
    }
}
