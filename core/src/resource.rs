//! Bookable resources and their capacity models.
//!
//! A resource is anything a reservation can commit: a room, a restaurant
//! table, a bookable service slot (spa, conference) or a depletable
//! inventory item. The capacity model decides which availability check the
//! coordinator runs:
//!
//! - **Exclusive**: one occupant per instant; conflicts are detected by
//!   interval overlap, not by counting
//! - **Concurrent**: up to N occupants per instant; conflicts are
//!   detected by summing overlapping committed amounts
//! - **Quantity**: a depletable stock with no time axis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReserveError;
use crate::ids::{PropertyId, ResourceId};
use crate::window::TimeWindow;

/// Maximum concurrent occupants of a `Concurrent` resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the capacity value
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of bookable thing a resource is.
///
/// The kind pins the time granularity of every reservation the resource
/// accepts: rooms are nightly, tables and service slots are slotted,
/// inventory items have no window at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Hotel room, booked per night
    Room,
    /// Restaurant table, booked per time slot
    Table,
    /// Bookable service slot (spa, conference room), booked per time slot
    ServiceSlot,
    /// Depletable stock item, booked by quantity
    InventoryItem,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Room => "room",
            Self::Table => "table",
            Self::ServiceSlot => "service-slot",
            Self::InventoryItem => "inventory-item",
        };
        write!(f, "{name}")
    }
}

/// How much load a resource can carry at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityModel {
    /// At most one occupant per instant; overlap-checked, never counted.
    Exclusive,
    /// Up to N concurrent occupants per instant.
    Concurrent(Capacity),
    /// Depletable stock; availability is `current_stock - reserved_stock`.
    Quantity {
        /// Stock on hand before any ledger movement is recorded
        initial_stock: u64,
    },
}

impl CapacityModel {
    /// The occupancy ceiling for time-windowed models; zero for stock.
    #[must_use]
    pub const fn occupancy_limit(&self) -> u32 {
        match self {
            Self::Exclusive => 1,
            Self::Concurrent(capacity) => capacity.value(),
            Self::Quantity { .. } => 0,
        }
    }

    /// Whether reservations against this model carry a time window.
    #[must_use]
    pub const fn is_windowed(&self) -> bool {
        !matches!(self, Self::Quantity { .. })
    }
}

/// Creation request for a resource, issued by property management.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Property the resource belongs to
    pub property_id: PropertyId,
    /// Kind of bookable thing
    pub kind: ResourceKind,
    /// Capacity model
    pub capacity_model: CapacityModel,
    /// Human-facing label ("Room 101", "Table 4", "Spa slot")
    pub name: String,
}

/// A bookable entity.
///
/// Immutable once referenced by a committed reservation, with one
/// exception: capacity may grow. Capacity decreases are validated against
/// the committed load by the catalog before they are applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    /// Unique id
    pub resource_id: ResourceId,
    /// Owning property
    pub property_id: PropertyId,
    /// Kind of bookable thing
    pub kind: ResourceKind,
    /// Capacity model
    pub capacity_model: CapacityModel,
    /// Human-facing label
    pub name: String,
    /// Retired resources accept no new reservations
    pub retired: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Builds a resource from a creation spec.
    #[must_use]
    pub fn new(resource_id: ResourceId, spec: ResourceSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            resource_id,
            property_id: spec.property_id,
            kind: spec.kind,
            capacity_model: spec.capacity_model,
            name: spec.name,
            retired: false,
            created_at,
        }
    }

    /// Checks that a reservation window matches this resource's
    /// granularity: rooms take nightly stays, tables and service slots
    /// take clock slots, inventory items take no window.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::InvalidWindow`] on any mismatch.
    pub fn accepts_window(&self, window: Option<&TimeWindow>) -> Result<(), ReserveError> {
        let ok = match (self.kind, window) {
            (ResourceKind::Room, Some(TimeWindow::Nights { .. }))
            | (
                ResourceKind::Table | ResourceKind::ServiceSlot,
                Some(TimeWindow::Slot { .. }),
            )
            | (ResourceKind::InventoryItem, None) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ReserveError::InvalidWindow {
                reason: format!(
                    "resource kind {} does not accept window {:?}",
                    self.kind, window
                ),
            })
        }
    }

    /// Occupancy ceiling per instant (1 for exclusive resources).
    #[must_use]
    pub const fn occupancy_limit(&self) -> u32 {
        self.capacity_model.occupancy_limit()
    }
}
