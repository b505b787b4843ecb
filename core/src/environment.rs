//! Injected dependencies: clock and notification delivery.
//!
//! The engine never reads the system clock or talks to a delivery channel
//! directly. Both come in behind traits so tests can pin time and capture
//! notices deterministically.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::ids::{ReservationId, ResourceId};
use crate::reservation::ReservationStatus;

/// Clock trait - abstracts time operations for testability.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fire-and-forget notice emitted on every reservation state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservationNotice {
    /// Reservation that transitioned
    pub reservation_id: ReservationId,
    /// Resource it commits
    pub resource_id: ResourceId,
    /// Status after the transition
    pub status: ReservationStatus,
}

/// Delivery channel for reservation notices (email/SMS/webhook fan-out
/// lives behind this trait, outside the engine).
///
/// Delivery is fire-and-forget: the engine spawns the future and moves on;
/// a delivery failure must never roll back a reservation.
pub trait Notifier: Send + Sync {
    /// Deliver one notice. Implementations handle their own retries and
    /// swallow their own failures.
    fn notify(&self, notice: ReservationNotice) -> BoxFuture<'static, ()>;
}

/// Notifier that drops every notice, for setups without a delivery
/// collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: ReservationNotice) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}
