//! Engine metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `innkeep_reservations_total{status}` - Reservation transitions by resulting status
//! - `innkeep_reservation_conflicts_total` - Requests refused for capacity
//! - `innkeep_lock_timeouts_total` - Per-resource lock waits that gave up
//! - `innkeep_holds_expired_total` - Holds expired by sweep or check-on-read
//!
//! ## Histograms
//! - `innkeep_lock_wait_seconds` - Time spent waiting on the per-resource lock

use metrics::{describe_counter, describe_histogram};

/// Reservation transitions by resulting status.
pub const RESERVATIONS_TOTAL: &str = "innkeep_reservations_total";
/// Requests refused because capacity would be exceeded.
pub const CONFLICTS_TOTAL: &str = "innkeep_reservation_conflicts_total";
/// Per-resource lock acquisitions that timed out.
pub const LOCK_TIMEOUTS_TOTAL: &str = "innkeep_lock_timeouts_total";
/// Holds expired by the sweeper or lazily on read.
pub const HOLDS_EXPIRED_TOTAL: &str = "innkeep_holds_expired_total";
/// Time spent waiting on the per-resource lock.
pub const LOCK_WAIT_SECONDS: &str = "innkeep_lock_wait_seconds";

/// Register metric descriptions. Call once at startup, before any metric
/// is recorded.
pub fn register_engine_metrics() {
    describe_counter!(
        RESERVATIONS_TOTAL,
        "Reservation state transitions by resulting status"
    );
    describe_counter!(
        CONFLICTS_TOTAL,
        "Reservation requests refused because capacity would be exceeded"
    );
    describe_counter!(
        LOCK_TIMEOUTS_TOTAL,
        "Per-resource lock acquisitions that exhausted their bounded wait"
    );
    describe_counter!(
        HOLDS_EXPIRED_TOTAL,
        "Holds expired by the background sweep or check-on-read"
    );
    describe_histogram!(
        LOCK_WAIT_SECONDS,
        "Seconds spent waiting to acquire the per-resource reservation lock"
    );
}
