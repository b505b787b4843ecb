//! Availability query service: the advisory read API.
//!
//! Callers (booking UI, concierge, channel managers) list free capacity
//! here before asking the coordinator to commit. Reads go to the
//! materialized index and never touch reservation locks; they may trail
//! the ledger slightly, which is fine: the coordinator re-validates
//! against the ledger before committing.

use std::sync::Arc;

use innkeep_core::error::ReserveError;
use innkeep_core::ids::{PropertyId, ResourceId};
use innkeep_core::resource::ResourceKind;
use innkeep_core::window::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::catalog::ResourceCatalog;
use crate::index::AvailabilityIndex;

/// An availability query.
#[derive(Clone, Debug, Default)]
pub struct AvailabilityQuery {
    /// Restrict to one resource kind
    pub kind: Option<ResourceKind>,
    /// Restrict to one property
    pub property_id: Option<PropertyId>,
    /// Window the caller wants; required for time-windowed kinds
    pub window: Option<TimeWindow>,
    /// Minimum free capacity a candidate must offer (defaults to 1)
    pub min_amount: u64,
}

/// One bookable candidate and its free capacity over the queried window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AvailabilityCandidate {
    /// Resource id to pass to the coordinator
    pub resource_id: ResourceId,
    /// Resource kind
    pub kind: ResourceKind,
    /// Human-facing label
    pub name: String,
    /// Minimum free capacity across every sub-interval of the window
    /// (every night of a stay), or free stock for inventory items
    pub free_capacity_at_window: u64,
}

/// Read-only availability listing over the materialized index.
pub struct AvailabilityQueryService {
    catalog: Arc<ResourceCatalog>,
    index: Arc<AvailabilityIndex>,
}

impl AvailabilityQueryService {
    /// Creates a query service over the given catalog and index.
    #[must_use]
    pub fn new(catalog: Arc<ResourceCatalog>, index: Arc<AvailabilityIndex>) -> Self {
        Self { catalog, index }
    }

    /// Lists candidates with free capacity for the query, best-supplied
    /// first. Candidates below `min_amount` free capacity are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::InvalidWindow`] when a time-windowed kind
    /// is queried without a window, or with an empty one.
    pub async fn query(
        &self,
        query: AvailabilityQuery,
    ) -> Result<Vec<AvailabilityCandidate>, ReserveError> {
        if let Some(window) = &query.window {
            window.validate()?;
        }
        let needed = query.min_amount.max(1);

        let mut candidates = Vec::new();
        for resource in self.catalog.list(query.property_id, query.kind).await {
            if resource.retired {
                continue;
            }
            if resource.capacity_model.is_windowed() {
                // A windowed kind without a window is not answerable
                let Some(window) = &query.window else {
                    return Err(ReserveError::InvalidWindow {
                        reason: format!("a time range is required to query {} availability", resource.kind),
                    });
                };
                if resource.accepts_window(Some(window)).is_err() {
                    // Mixed-kind listing: skip resources of the other granularity
                    continue;
                }
            }

            let free = self
                .index
                .free_for(&resource, query.window.as_ref())
                .await;
            if free >= needed {
                candidates.push(AvailabilityCandidate {
                    resource_id: resource.resource_id,
                    kind: resource.kind,
                    name: resource.name,
                    free_capacity_at_window: free,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.free_capacity_at_window
                .cmp(&a.free_capacity_at_window)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });
        Ok(candidates)
    }
}
