//! Availability index: the materialized, fast-read projection.
//!
//! One row per `(resource, bucket)` holding the committed amount: nightly
//! buckets for rooms, slot rows for tables and service slots, and a single
//! stock row per inventory item. The index is fed the same ledger events
//! the coordinator appends, inside the coordinator's critical section, so
//! it is invalidated-on-write rather than best-effort.
//!
//! Reads here never take reservation locks and may trail the ledger; they
//! are a candidate filter for callers, never the basis of a commit. Slot
//! queries sum every overlapping row, which can over-count reservations
//! that never coincide in time, which errs in the safe direction for an
//! advisory read.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use innkeep_core::event::{LedgerEvent, StockMovement};
use innkeep_core::ids::{HolderId, ReservationId, ResourceId};
use innkeep_core::ledger::RecordedEvent;
use innkeep_core::resource::Resource;
use innkeep_core::window::{Bucket, TimeWindow};
use tokio::sync::RwLock;

/// Materialized stock row of a quantity resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StockLevels {
    /// Stock on hand
    pub current_stock: u64,
    /// Stock held by live reservations
    pub reserved_stock: u64,
}

impl StockLevels {
    /// Free stock: `current_stock - reserved_stock`.
    #[must_use]
    pub const fn available(&self) -> u64 {
        self.current_stock.saturating_sub(self.reserved_stock)
    }
}

struct WindowEntry {
    resource_id: ResourceId,
    window: TimeWindow,
    amount: u64,
}

struct StockEntry {
    reservation_id: ReservationId,
    holder_id: HolderId,
    remaining: u64,
}

#[derive(Default)]
struct IndexInner {
    nights: HashMap<ResourceId, BTreeMap<NaiveDate, u64>>,
    slots: HashMap<ResourceId, BTreeMap<(DateTime<Utc>, DateTime<Utc>), u64>>,
    stock: HashMap<ResourceId, StockLevels>,
    window_entries: HashMap<ReservationId, WindowEntry>,
    stock_entries: HashMap<ResourceId, Vec<StockEntry>>,
    stock_by_reservation: HashMap<ReservationId, ResourceId>,
    /// Reservation ids already materialized, so re-delivered creation
    /// events are no-ops
    seen: HashSet<ReservationId>,
}

impl IndexInner {
    fn add_window(&mut self, reservation_id: ReservationId, entry: WindowEntry) {
        for bucket in entry.window.buckets() {
            match bucket {
                Bucket::Night(night) => {
                    *self
                        .nights
                        .entry(entry.resource_id)
                        .or_default()
                        .entry(night)
                        .or_insert(0) += entry.amount;
                }
                Bucket::Slot { starts_at, ends_at } => {
                    *self
                        .slots
                        .entry(entry.resource_id)
                        .or_default()
                        .entry((starts_at, ends_at))
                        .or_insert(0) += entry.amount;
                }
            }
        }
        self.window_entries.insert(reservation_id, entry);
    }

    fn remove_window(&mut self, reservation_id: &ReservationId) {
        let Some(entry) = self.window_entries.remove(reservation_id) else {
            return;
        };
        for bucket in entry.window.buckets() {
            match bucket {
                Bucket::Night(night) => {
                    if let Some(rows) = self.nights.get_mut(&entry.resource_id) {
                        if let Some(committed) = rows.get_mut(&night) {
                            *committed = committed.saturating_sub(entry.amount);
                            if *committed == 0 {
                                rows.remove(&night);
                            }
                        }
                    }
                }
                Bucket::Slot { starts_at, ends_at } => {
                    if let Some(rows) = self.slots.get_mut(&entry.resource_id) {
                        let key = (starts_at, ends_at);
                        if let Some(committed) = rows.get_mut(&key) {
                            *committed = committed.saturating_sub(entry.amount);
                            if *committed == 0 {
                                rows.remove(&key);
                            }
                        }
                    }
                }
            }
        }
    }

    fn add_stock_reservation(
        &mut self,
        reservation_id: ReservationId,
        resource_id: ResourceId,
        holder_id: HolderId,
        amount: u64,
    ) {
        let row = self.stock.entry(resource_id).or_default();
        row.reserved_stock = row.reserved_stock.saturating_add(amount);
        self.stock_entries
            .entry(resource_id)
            .or_default()
            .push(StockEntry {
                reservation_id,
                holder_id,
                remaining: amount,
            });
        self.stock_by_reservation.insert(reservation_id, resource_id);
    }

    fn remove_stock_reservation(&mut self, reservation_id: &ReservationId) {
        let Some(resource_id) = self.stock_by_reservation.remove(reservation_id) else {
            return;
        };
        let Some(entries) = self.stock_entries.get_mut(&resource_id) else {
            return;
        };
        if let Some(position) = entries
            .iter()
            .position(|entry| entry.reservation_id == *reservation_id)
        {
            let entry = entries.remove(position);
            if let Some(row) = self.stock.get_mut(&resource_id) {
                row.reserved_stock = row.reserved_stock.saturating_sub(entry.remaining);
            }
        }
    }

    /// Mirrors the fold's oldest-first drain of a holder's reserved stock.
    fn drain_holder_stock(&mut self, resource_id: ResourceId, holder_id: HolderId, amount: u64) {
        if let Some(row) = self.stock.get_mut(&resource_id) {
            row.reserved_stock = row.reserved_stock.saturating_sub(amount);
        }
        let Some(entries) = self.stock_entries.get_mut(&resource_id) else {
            return;
        };
        let mut left = amount;
        for entry in entries.iter_mut() {
            if left == 0 {
                break;
            }
            if entry.holder_id != holder_id {
                continue;
            }
            let taken = entry.remaining.min(left);
            entry.remaining -= taken;
            left -= taken;
        }
        let mut drained = Vec::new();
        entries.retain(|entry| {
            if entry.remaining == 0 {
                drained.push(entry.reservation_id);
                false
            } else {
                true
            }
        });
        for reservation_id in drained {
            self.stock_by_reservation.remove(&reservation_id);
        }
    }
}

/// Materialized availability rows, derived from the ledger.
#[derive(Default)]
pub struct AvailabilityIndex {
    inner: RwLock<IndexInner>,
}

impl AvailabilityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one ledger event into the materialized rows. Idempotent per
    /// reservation id.
    pub async fn apply(&self, event: &LedgerEvent) {
        let mut inner = self.inner.write().await;
        match event {
            LedgerEvent::ReservationHeld {
                reservation_id,
                resource_id,
                holder_id,
                window,
                amount,
                ..
            }
            | LedgerEvent::ReservationCommitted {
                reservation_id,
                resource_id,
                holder_id,
                window,
                amount,
                ..
            } => {
                if !inner.seen.insert(*reservation_id) {
                    return;
                }
                match window {
                    Some(window) => inner.add_window(
                        *reservation_id,
                        WindowEntry {
                            resource_id: *resource_id,
                            window: *window,
                            amount: *amount,
                        },
                    ),
                    None => inner.add_stock_reservation(
                        *reservation_id,
                        *resource_id,
                        *holder_id,
                        *amount,
                    ),
                }
            }

            // Already counted when the hold was placed
            LedgerEvent::ReservationConfirmed { .. } => {}

            LedgerEvent::ReservationCancelled { reservation_id, .. }
            | LedgerEvent::ReservationReleased { reservation_id, .. }
            | LedgerEvent::ReservationExpired { reservation_id, .. } => {
                inner.remove_window(reservation_id);
                inner.remove_stock_reservation(reservation_id);
            }

            LedgerEvent::StockReleased {
                resource_id,
                holder_id,
                amount,
                ..
            } => inner.drain_holder_stock(*resource_id, *holder_id, *amount),

            LedgerEvent::StockRecorded {
                resource_id,
                movement,
                ..
            } => {
                let row = inner.stock.entry(*resource_id).or_default();
                match movement {
                    StockMovement::Load(units) => {
                        row.current_stock = row.current_stock.saturating_add(*units);
                    }
                    StockMovement::Waste(units) => {
                        row.current_stock = row.current_stock.saturating_sub(*units);
                    }
                    StockMovement::Adjust(delta) => {
                        row.current_stock = row.current_stock.saturating_add_signed(*delta);
                    }
                }
            }
        }
    }

    /// Replays a batch of recorded events, e.g. to rebuild after a reset.
    pub async fn apply_all(&self, events: &[RecordedEvent]) {
        for recorded in events {
            self.apply(&recorded.event).await;
        }
    }

    /// Drops every materialized row.
    pub async fn reset(&self) {
        *self.inner.write().await = IndexInner::default();
    }

    /// Free capacity of a resource over a window (minimum across every
    /// night of a stay), or free stock for quantity resources. Advisory.
    pub async fn free_for(&self, resource: &Resource, window: Option<&TimeWindow>) -> u64 {
        let inner = self.inner.read().await;
        if !resource.capacity_model.is_windowed() {
            return inner
                .stock
                .get(&resource.resource_id)
                .copied()
                .unwrap_or_default()
                .available();
        }
        let limit = u64::from(resource.occupancy_limit());
        let Some(window) = window else {
            return limit;
        };
        match window {
            TimeWindow::Nights { .. } => {
                let rows = inner.nights.get(&resource.resource_id);
                window
                    .nights()
                    .map(|night| {
                        let committed = rows
                            .and_then(|rows| rows.get(&night))
                            .copied()
                            .unwrap_or(0);
                        limit.saturating_sub(committed)
                    })
                    .min()
                    .unwrap_or(0)
            }
            TimeWindow::Slot { starts_at, ends_at } => {
                let committed: u64 = inner
                    .slots
                    .get(&resource.resource_id)
                    .map(|rows| {
                        rows.range(..(*ends_at, *ends_at))
                            .filter(|((_, row_end), _)| row_end > starts_at)
                            .map(|(_, committed)| *committed)
                            .sum()
                    })
                    .unwrap_or(0);
                limit.saturating_sub(committed)
            }
        }
    }

    /// The materialized stock row of a quantity resource, if any movement
    /// or reservation has touched it.
    pub async fn stock_levels(&self, resource_id: ResourceId) -> Option<StockLevels> {
        self.inner.read().await.stock.get(&resource_id).copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use innkeep_core::ids::PropertyId;
    use innkeep_core::resource::{Capacity, CapacityModel, ResourceKind, ResourceSpec};

    fn room() -> Resource {
        Resource::new(
            ResourceId::new(),
            ResourceSpec {
                property_id: PropertyId::new(),
                kind: ResourceKind::Room,
                capacity_model: CapacityModel::Exclusive,
                name: "Room 101".to_string(),
            },
            Utc::now(),
        )
    }

    fn stay(check_in: &str, check_out: &str) -> TimeWindow {
        TimeWindow::Nights {
            check_in: check_in.parse().unwrap(),
            check_out: check_out.parse().unwrap(),
        }
    }

    fn committed(resource: &Resource, window: TimeWindow) -> (ReservationId, LedgerEvent) {
        let reservation_id = ReservationId::new();
        let event = LedgerEvent::ReservationCommitted {
            reservation_id,
            resource_id: resource.resource_id,
            holder_id: HolderId::new(),
            window: Some(window),
            amount: 1,
            committed_at: Utc::now(),
        };
        (reservation_id, event)
    }

    #[tokio::test]
    async fn nightly_rows_track_commit_and_cancel() {
        let index = AvailabilityIndex::new();
        let room = room();
        let (reservation_id, event) = committed(&room, stay("2024-06-01", "2024-06-03"));

        index.apply(&event).await;
        assert_eq!(
            index.free_for(&room, Some(&stay("2024-06-01", "2024-06-02"))).await,
            0
        );
        assert_eq!(
            index.free_for(&room, Some(&stay("2024-06-03", "2024-06-04"))).await,
            1
        );

        index
            .apply(&LedgerEvent::ReservationCancelled {
                reservation_id,
                cancelled_at: Utc::now(),
            })
            .await;
        assert_eq!(
            index.free_for(&room, Some(&stay("2024-06-01", "2024-06-02"))).await,
            1
        );
    }

    #[tokio::test]
    async fn duplicate_events_do_not_double_count() {
        let index = AvailabilityIndex::new();
        let room = room();
        let (_, event) = committed(&room, stay("2024-06-01", "2024-06-02"));

        index.apply(&event).await;
        index.apply(&event).await;

        // A second apply of the same commit must not drive free below zero
        // on a capacity-1 resource
        assert_eq!(
            index.free_for(&room, Some(&stay("2024-06-01", "2024-06-02"))).await,
            0
        );
        index
            .apply(&LedgerEvent::ReservationCancelled {
                reservation_id: event.reservation_id().unwrap(),
                cancelled_at: Utc::now(),
            })
            .await;
        assert_eq!(
            index.free_for(&room, Some(&stay("2024-06-01", "2024-06-02"))).await,
            1
        );
    }

    #[tokio::test]
    async fn stay_free_capacity_is_minimum_across_nights() {
        let index = AvailabilityIndex::new();
        let table = Resource::new(
            ResourceId::new(),
            ResourceSpec {
                property_id: PropertyId::new(),
                kind: ResourceKind::Room,
                capacity_model: CapacityModel::Concurrent(Capacity::new(3)),
                name: "Dorm".to_string(),
            },
            Utc::now(),
        );
        let (_, event) = committed(&table, stay("2024-06-02", "2024-06-03"));
        index.apply(&event).await;

        // Night of June 2 has 2 free, other nights 3; the stay reports 2
        assert_eq!(
            index.free_for(&table, Some(&stay("2024-06-01", "2024-06-04"))).await,
            2
        );
    }

    #[tokio::test]
    async fn stock_rows_follow_movements() {
        let index = AvailabilityIndex::new();
        let resource_id = ResourceId::new();
        let holder_id = HolderId::new();

        index
            .apply(&LedgerEvent::StockRecorded {
                resource_id,
                movement: StockMovement::Load(30),
                recorded_at: Utc::now(),
            })
            .await;
        let reservation_id = ReservationId::new();
        index
            .apply(&LedgerEvent::ReservationCommitted {
                reservation_id,
                resource_id,
                holder_id,
                window: None,
                amount: 12,
                committed_at: Utc::now(),
            })
            .await;
        index
            .apply(&LedgerEvent::StockReleased {
                resource_id,
                holder_id,
                amount: 4,
                released_at: Utc::now(),
            })
            .await;

        let row = index.stock_levels(resource_id).await.unwrap();
        assert_eq!(row.current_stock, 30);
        assert_eq!(row.reserved_stock, 8);
        assert_eq!(row.available(), 22);
    }
}
