//! Error taxonomy of the reservation engine.
//!
//! Everything here is returned as a typed result; nothing is swallowed.
//! `Conflict` and `LockTimeout` are expected outcomes a caller retries
//! around (the first by picking another resource or window from a fresh
//! availability query, the second by resubmitting), not system faults.

use thiserror::Error;

use crate::ids::{ReservationId, ResourceId};
use crate::ledger::LedgerError;
use crate::reservation::ReservationStatus;
use crate::window::TimeWindow;

/// Errors surfaced by the catalog, coordinator and query service.
#[derive(Error, Debug)]
pub enum ReserveError {
    /// Committing the request would exceed capacity. Carries the first
    /// conflicting night or sub-window so the caller can retry
    /// intelligently instead of resubmitting blind.
    #[error("capacity conflict on {resource_id}: requested {requested}, available {available}")]
    Conflict {
        /// Resource that is out of capacity
        resource_id: ResourceId,
        /// First conflicting night/sub-window; `None` for stock conflicts
        window: Option<TimeWindow>,
        /// Amount the caller asked for
        requested: u64,
        /// Amount actually free at the conflicting point
        available: u64,
    },

    /// Unknown or retired resource.
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    /// Unknown reservation.
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// The window is empty, inverted, or of the wrong granularity for the
    /// resource kind.
    #[error("invalid window: {reason}")]
    InvalidWindow {
        /// What was wrong with the request
        reason: String,
    },

    /// A zero or otherwise unusable requested amount.
    #[error("requested amount must be greater than zero")]
    InvalidAmount,

    /// Catalog refused a capacity decrease below the committed load, or a
    /// stock movement that would push stock on hand below the reserved
    /// amount.
    #[error("requested capacity {requested} is below committed load {committed}")]
    CapacityBelowCommitted {
        /// Peak load currently committed
        committed: u64,
        /// Capacity the update asked for
        requested: u64,
    },

    /// Capacity updates apply to occupancy resources; the stock of an
    /// inventory item changes through the movement ledger instead.
    #[error("resource {0} does not take capacity updates; record a stock movement instead")]
    CapacityNotUpdatable(ResourceId),

    /// Release asked for more than the holder has outstanding. State is
    /// left unchanged, never silently clamped.
    #[error("release of {requested} exceeds reserved amount {reserved}")]
    ReleaseExceedsReservation {
        /// Amount the holder actually has reserved
        reserved: u64,
        /// Amount the release asked for
        requested: u64,
    },

    /// The per-resource lock could not be acquired within the bounded
    /// wait. Retryable; surfaced as 503 at the HTTP boundary.
    #[error("timed out waiting for the reservation lock on {resource_id}")]
    LockTimeout {
        /// Resource whose lock was contended
        resource_id: ResourceId,
    },

    /// The reservation state machine forbids this transition.
    #[error("illegal reservation transition {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: ReservationStatus,
        /// Requested status
        to: ReservationStatus,
    },

    /// Ledger storage failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReserveError {
    /// Expected, caller-retryable outcomes (as opposed to faults).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::LockTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_names_the_window() {
        let night = TimeWindow::single_night("2024-06-02".parse().unwrap_or_default());
        let error = ReserveError::Conflict {
            resource_id: ResourceId::new(),
            window: Some(night),
            requested: 1,
            available: 0,
        };
        assert!(error.is_retryable());
        match error {
            ReserveError::Conflict {
                window: Some(TimeWindow::Nights { check_in, .. }),
                ..
            } => assert_eq!(check_in.to_string(), "2024-06-02"),
            _ => unreachable!("conflict carries its window"),
        }
    }

    #[test]
    fn faults_are_not_retryable() {
        let error = ReserveError::InvalidAmount;
        assert!(!error.is_retryable());
    }
}
