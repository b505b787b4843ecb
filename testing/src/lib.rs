//! Testing utilities for the Innkeep reservation engine.
//!
//! - [`FixedClock`]: a settable clock so hold expiry and check-on-read can
//!   be tested without sleeping
//! - [`CollectingNotifier`]: captures every reservation notice for
//!   assertions
//! - [`fixtures`]: resource specs and window builders used across the
//!   test suites

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use innkeep_core::environment::{Clock, Notifier, ReservationNotice};

/// A clock pinned to a settable instant.
///
/// Starts at the given time and only moves when told to, so TTL behavior
/// is deterministic under test.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock pinned at the current system time.
    #[must_use]
    pub fn at_now() -> Self {
        Self::new(Utc::now())
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }

    /// Pins the clock to an exact instant.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Notifier that records every notice it is asked to deliver.
#[derive(Default)]
pub struct CollectingNotifier {
    notices: std::sync::Arc<Mutex<Vec<ReservationNotice>>>,
}

impl CollectingNotifier {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn notices(&self) -> Vec<ReservationNotice> {
        self.notices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: ReservationNotice) -> BoxFuture<'static, ()> {
        let notices = std::sync::Arc::clone(&self.notices);
        Box::pin(async move {
            notices
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(notice);
        })
    }
}

/// Resource specs and window builders shared across test suites.
pub mod fixtures {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use innkeep_core::ids::PropertyId;
    use innkeep_core::resource::{Capacity, CapacityModel, ResourceKind, ResourceSpec};
    use innkeep_core::window::TimeWindow;

    /// An exclusive, nightly room.
    #[must_use]
    pub fn room_spec(property_id: PropertyId, name: &str) -> ResourceSpec {
        ResourceSpec {
            property_id,
            kind: ResourceKind::Room,
            capacity_model: CapacityModel::Exclusive,
            name: name.to_string(),
        }
    }

    /// A slotted table seating `capacity` concurrently.
    #[must_use]
    pub fn table_spec(property_id: PropertyId, name: &str, capacity: u32) -> ResourceSpec {
        ResourceSpec {
            property_id,
            kind: ResourceKind::Table,
            capacity_model: CapacityModel::Concurrent(Capacity::new(capacity)),
            name: name.to_string(),
        }
    }

    /// A quantity inventory item with the given opening stock.
    #[must_use]
    pub fn inventory_spec(property_id: PropertyId, name: &str, initial_stock: u64) -> ResourceSpec {
        ResourceSpec {
            property_id,
            kind: ResourceKind::InventoryItem,
            capacity_model: CapacityModel::Quantity { initial_stock },
            name: name.to_string(),
        }
    }

    /// A nightly stay from ISO dates.
    ///
    /// # Panics
    ///
    /// Panics on unparsable dates; fixture input is test-controlled.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn stay(check_in: &str, check_out: &str) -> TimeWindow {
        TimeWindow::Nights {
            check_in: parse_date(check_in),
            check_out: parse_date(check_out),
        }
    }

    /// A clock slot on the given date, `[from_hour, to_hour)` UTC.
    #[must_use]
    pub fn slot(date: &str, from_hour: u32, to_hour: u32) -> TimeWindow {
        TimeWindow::Slot {
            starts_at: at(date, from_hour),
            ends_at: at(date, to_hour),
        }
    }

    #[allow(clippy::expect_used)] // Fixture input is test-controlled
    fn parse_date(value: &str) -> NaiveDate {
        value.parse().expect("fixture date must parse")
    }

    #[allow(clippy::expect_used)] // Fixture input is test-controlled
    fn at(date: &str, hour: u32) -> DateTime<Utc> {
        let date = parse_date(date);
        Utc.with_ymd_and_hms(
            chrono::Datelike::year(&date),
            chrono::Datelike::month(&date),
            chrono::Datelike::day(&date),
            hour,
            0,
            0,
        )
        .single()
        .expect("fixture time must be valid")
    }
}
