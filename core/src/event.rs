//! Ledger events: the immutable facts of the reservation system.
//!
//! Every state change flows through the ledger as an appended event:
//! reservations being held, committed, confirmed, cancelled, released or
//! expired, and stock movements for inventory items. The availability
//! index and every authoritative capacity check are derived by folding
//! these events; nothing else is a source of truth.
//!
//! Event type strings carry a version suffix (`"ReservationHeld.v1"`) so
//! schemas can evolve without rewriting history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{HolderId, ReservationId, ResourceId};
use crate::window::TimeWindow;

/// A movement on the quantity ledger of an inventory item.
///
/// Reservation and release of stock are carried by the reservation events
/// in [`LedgerEvent`]; the movements here cover the remaining taxonomy so
/// the one ledger is the full audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockMovement {
    /// Stock received into inventory
    Load(u64),
    /// Stock destroyed or spoiled, removed from hand
    Waste(u64),
    /// Signed correction after a physical count
    Adjust(i64),
}

/// An immutable fact appended to a resource's ledger stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A hold was placed: capacity is taken until the TTL runs out or the
    /// hold is confirmed.
    ReservationHeld {
        /// Reservation id
        reservation_id: ReservationId,
        /// Resource the hold commits
        resource_id: ResourceId,
        /// Holding party
        holder_id: HolderId,
        /// Interval held; `None` for quantity resources
        window: Option<TimeWindow>,
        /// Occupants or stock units
        amount: u64,
        /// Hold deadline
        expires_at: DateTime<Utc>,
        /// When the hold was placed
        held_at: DateTime<Utc>,
    },

    /// A reservation was validated and confirmed in one step.
    ReservationCommitted {
        /// Reservation id
        reservation_id: ReservationId,
        /// Resource the reservation commits
        resource_id: ResourceId,
        /// Holding party
        holder_id: HolderId,
        /// Interval committed; `None` for quantity resources
        window: Option<TimeWindow>,
        /// Occupants or stock units
        amount: u64,
        /// When the reservation was committed
        committed_at: DateTime<Utc>,
    },

    /// A pending hold was finalized.
    ReservationConfirmed {
        /// Reservation id
        reservation_id: ReservationId,
        /// When the hold was confirmed
        confirmed_at: DateTime<Utc>,
    },

    /// A confirmed reservation was annulled; its capacity returns.
    ReservationCancelled {
        /// Reservation id
        reservation_id: ReservationId,
        /// When the reservation was cancelled
        cancelled_at: DateTime<Utc>,
    },

    /// A confirmed reservation was released back to the pool (early
    /// checkout, full stock return).
    ReservationReleased {
        /// Reservation id
        reservation_id: ReservationId,
        /// When the reservation was released
        released_at: DateTime<Utc>,
    },

    /// A pending hold ran out its TTL.
    ReservationExpired {
        /// Reservation id
        reservation_id: ReservationId,
        /// When the expiry was recorded
        expired_at: DateTime<Utc>,
    },

    /// Part of a holder's reserved stock was returned without closing the
    /// underlying reservations.
    StockReleased {
        /// Inventory resource
        resource_id: ResourceId,
        /// Holder returning the stock
        holder_id: HolderId,
        /// Units returned
        amount: u64,
        /// When the return was recorded
        released_at: DateTime<Utc>,
    },

    /// A stock movement on an inventory item (load, waste, adjustment).
    StockRecorded {
        /// Inventory resource
        resource_id: ResourceId,
        /// The movement
        movement: StockMovement,
        /// When the movement was recorded
        recorded_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Stable, versioned event type identifier.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ReservationHeld { .. } => "ReservationHeld.v1",
            Self::ReservationCommitted { .. } => "ReservationCommitted.v1",
            Self::ReservationConfirmed { .. } => "ReservationConfirmed.v1",
            Self::ReservationCancelled { .. } => "ReservationCancelled.v1",
            Self::ReservationReleased { .. } => "ReservationReleased.v1",
            Self::ReservationExpired { .. } => "ReservationExpired.v1",
            Self::StockReleased { .. } => "StockReleased.v1",
            Self::StockRecorded { .. } => "StockRecorded.v1",
        }
    }

    /// The reservation this event belongs to, when it belongs to one.
    #[must_use]
    pub const fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            Self::ReservationHeld { reservation_id, .. }
            | Self::ReservationCommitted { reservation_id, .. }
            | Self::ReservationConfirmed { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id, .. }
            | Self::ReservationReleased { reservation_id, .. }
            | Self::ReservationExpired { reservation_id, .. } => Some(*reservation_id),
            Self::StockReleased { .. } | Self::StockRecorded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn event_types_are_versioned() {
        let event = LedgerEvent::ReservationCancelled {
            reservation_id: ReservationId::new(),
            cancelled_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "ReservationCancelled.v1");
    }

    #[test]
    fn stock_events_carry_no_reservation() {
        let event = LedgerEvent::StockRecorded {
            resource_id: ResourceId::new(),
            movement: StockMovement::Load(40),
            recorded_at: Utc::now(),
        };
        assert_eq!(event.reservation_id(), None);
    }
}
