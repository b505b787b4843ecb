//! # Innkeep Engine
//!
//! The reservation engine: resource catalog, availability index,
//! reservation coordinator, availability query service and the background
//! hold sweeper.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐    advisory    ┌─────────────────┐
//!  callers ─ query ─▶│ QueryService │───────────────▶│ Availability    │
//!                    └──────────────┘                │ Index (derived) │
//!                    ┌──────────────┐    fold-on-    └─────────────────┘
//!  callers ─ book ──▶│ Coordinator  │──── write ────────────▲
//!                    │  (per-res    │                       │
//!                    │   lock)      │── append ──▶ Ledger ──┘
//!                    └──────────────┘              (source of truth)
//! ```
//!
//! The coordinator is the only writer. It serializes per resource,
//! recomputes committed load from the ledger inside the lock, appends the
//! resulting event and folds it into the index in the same critical
//! section. Queries read the index and never block on reservation locks.

pub mod catalog;
pub mod coordinator;
pub mod index;
pub mod memory;
pub mod metrics;
pub mod occupancy;
pub mod query;
pub mod sweeper;

pub use catalog::ResourceCatalog;
pub use coordinator::{CoordinatorConfig, ReservationCoordinator, ReserveRequest};
pub use index::{AvailabilityIndex, StockLevels};
pub use memory::MemoryLedger;
pub use occupancy::{ResourceLoad, StockSnapshot};
pub use query::{AvailabilityCandidate, AvailabilityQuery, AvailabilityQueryService};
pub use sweeper::{spawn_hold_sweeper, SweeperHandle};
