//! Reservations and their state machine.
//!
//! A reservation is the unit of commitment against a resource. Its status
//! moves only along the legal edges:
//!
//! ```text
//! Pending ──▶ Confirmed ──▶ Cancelled
//!    │             └──────▶ Released
//!    └──────▶ Expired
//! ```
//!
//! `Cancelled`, `Released` and `Expired` are terminal. Every transition is
//! written by the coordinator's locked path; no other component touches
//! reservation status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{HolderId, ReservationId, ResourceId};
use crate::window::TimeWindow;

/// Lifecycle status of a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Held but not yet finalized; expires after its TTL
    Pending,
    /// Committed; counts against capacity until cancelled or released
    Confirmed,
    /// Annulled by the holder (terminal)
    Cancelled,
    /// Returned to the pool, e.g. early checkout or stock return (terminal)
    Released,
    /// Hold that ran out its TTL (terminal)
    Expired,
}

impl ReservationStatus {
    /// Whether the state machine permits moving to `next`.
    #[must_use]
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Expired)
                | (Self::Confirmed, Self::Cancelled | Self::Released)
        )
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Released | Self::Expired)
    }

    /// Whether a reservation in this status holds capacity.
    #[must_use]
    pub const fn holds_capacity(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Released => "released",
            Self::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// How a reservation request should be committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveMode {
    /// Validate and confirm in one step.
    Commit,
    /// Create a short-lived hold that must be confirmed before the TTL
    /// runs out, or it expires on its own.
    Hold {
        /// Caller-supplied time to live, in seconds
        ttl_seconds: u64,
    },
}

/// The unit of commitment against a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique id
    pub reservation_id: ReservationId,
    /// Resource this reservation commits
    pub resource_id: ResourceId,
    /// Party holding the reservation (opaque, externally issued)
    pub holder_id: HolderId,
    /// Interval the reservation applies to; `None` for quantity resources
    pub window: Option<TimeWindow>,
    /// Occupants for windowed resources, units for quantity resources
    pub amount: u64,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Hold deadline; `None` once confirmed or for immediate commits
    pub expires_at: Option<DateTime<Utc>>,
    /// Ledger version at which this reservation was last written
    pub version: u64,
}

impl Reservation {
    /// A pending hold past its deadline counts as already expired on every
    /// read, whether or not the sweeper has caught up.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending
            && self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    /// Status as observed at `now`, folding in check-on-read expiry.
    #[must_use]
    pub fn observed_status(&self, now: DateTime<Utc>) -> ReservationStatus {
        if self.is_expired(now) {
            ReservationStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether this reservation counts against capacity at `now`.
    #[must_use]
    pub fn holds_capacity_at(&self, now: DateTime<Utc>) -> bool {
        self.observed_status(now).holds_capacity()
    }
}
