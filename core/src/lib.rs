//! # Innkeep Core
//!
//! Domain model and ledger contracts for the Innkeep reservation engine.
//!
//! This crate defines the write-side vocabulary shared by every other crate
//! in the workspace:
//!
//! - **Resources**: bookable entities (rooms, tables, service slots,
//!   inventory items) and their capacity models
//! - **Time windows**: half-open intervals a reservation applies to
//! - **Reservations**: the unit of commitment and its state machine
//! - **Ledger events**: immutable facts appended per resource; the single
//!   source of truth from which all availability views are derived
//! - **`LedgerStore`**: the persistence contract with optimistic
//!   concurrency and snapshot support
//! - **Environment traits**: `Clock` and `Notifier`, injected so the
//!   engine stays deterministic under test
//!
//! The engine crate folds ledger events into authoritative per-resource
//! state before every commit decision; materialized availability views are
//! projections of the same events and are advisory only.

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

pub mod environment;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;
pub mod reservation;
pub mod resource;
pub mod window;

pub use environment::{Clock, Notifier, NullNotifier, ReservationNotice, SystemClock};
pub use error::ReserveError;
pub use event::{LedgerEvent, StockMovement};
pub use ids::{HolderId, PropertyId, ReservationId, ResourceId};
pub use ledger::{LedgerError, LedgerStore, RecordedEvent, Version};
pub use reservation::{Reservation, ReservationStatus, ReserveMode};
pub use resource::{Capacity, CapacityModel, Resource, ResourceKind, ResourceSpec};
pub use window::{Bucket, TimeWindow};
