//! Resource catalog: identity and capacity of every bookable thing.
//!
//! Read-mostly, mutated by property management. The one rule with teeth
//! lives in [`ResourceCatalog::update_capacity`]: capacity never drops
//! below the peak committed load, recomputed from the ledger at the time
//! of the update.

use std::collections::HashMap;
use std::sync::Arc;

use innkeep_core::environment::Clock;
use innkeep_core::error::ReserveError;
use innkeep_core::event::{LedgerEvent, StockMovement};
use innkeep_core::ids::{PropertyId, ResourceId};
use innkeep_core::ledger::LedgerStore;
use innkeep_core::resource::{Capacity, CapacityModel, Resource, ResourceKind, ResourceSpec};
use tokio::sync::RwLock;

use crate::occupancy::ResourceLoad;

/// Catalog of bookable resources.
pub struct ResourceCatalog {
    resources: RwLock<HashMap<ResourceId, Resource>>,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl ResourceCatalog {
    /// Creates an empty catalog over the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            ledger,
            clock,
        }
    }

    /// Registers a new resource. For inventory items the declared initial
    /// stock becomes the first movement on the resource's ledger, so the
    /// audit trail starts at zero and loads up.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::InvalidAmount`] for a zero concurrent
    /// capacity, and ledger errors from seeding the initial stock.
    pub async fn create(&self, spec: ResourceSpec) -> Result<Resource, ReserveError> {
        if let CapacityModel::Concurrent(capacity) = spec.capacity_model {
            if capacity.value() == 0 {
                return Err(ReserveError::InvalidAmount);
            }
        }

        let resource_id = ResourceId::new();
        let now = self.clock.now();

        if let CapacityModel::Quantity { initial_stock } = spec.capacity_model {
            if initial_stock > 0 {
                self.ledger
                    .append(
                        resource_id,
                        None,
                        vec![LedgerEvent::StockRecorded {
                            resource_id,
                            movement: StockMovement::Load(initial_stock),
                            recorded_at: now,
                        }],
                    )
                    .await?;
            }
        }

        let resource = Resource::new(resource_id, spec, now);
        self.resources
            .write()
            .await
            .insert(resource_id, resource.clone());
        tracing::info!(
            resource_id = %resource_id,
            kind = %resource.kind,
            "resource created"
        );
        Ok(resource)
    }

    /// Looks up a resource (retired ones included; the coordinator
    /// refuses new reservations on them, the catalog does not hide them).
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::ResourceNotFound`] for an unknown id.
    pub async fn get(&self, resource_id: ResourceId) -> Result<Resource, ReserveError> {
        self.resources
            .read()
            .await
            .get(&resource_id)
            .cloned()
            .ok_or(ReserveError::ResourceNotFound(resource_id))
    }

    /// Lists resources, optionally filtered by property and kind.
    pub async fn list(
        &self,
        property_id: Option<PropertyId>,
        kind: Option<ResourceKind>,
    ) -> Vec<Resource> {
        let resources = self.resources.read().await;
        let mut matches: Vec<Resource> = resources
            .values()
            .filter(|r| property_id.is_none_or(|p| r.property_id == p))
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        matches
    }

    /// Marks a resource retired. Existing reservations stand; new ones are
    /// refused by the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::ResourceNotFound`] for an unknown id.
    pub async fn retire(&self, resource_id: ResourceId) -> Result<Resource, ReserveError> {
        let mut resources = self.resources.write().await;
        let resource = resources
            .get_mut(&resource_id)
            .ok_or(ReserveError::ResourceNotFound(resource_id))?;
        resource.retired = true;
        Ok(resource.clone())
    }

    /// Changes the occupancy ceiling of a concurrent resource (an
    /// exclusive resource may grow into a concurrent one). The new
    /// capacity must cover the peak committed load, recomputed from the
    /// ledger.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::ResourceNotFound`] for an unknown id
    /// - [`ReserveError::InvalidAmount`] for a zero capacity
    /// - [`ReserveError::CapacityNotUpdatable`] for inventory items, whose
    ///   stock changes flow through the movement ledger instead
    /// - [`ReserveError::CapacityBelowCommitted`] when the new capacity is
    ///   below the peak committed load
    pub async fn update_capacity(
        &self,
        resource_id: ResourceId,
        new_capacity: Capacity,
    ) -> Result<Resource, ReserveError> {
        if new_capacity.value() == 0 {
            return Err(ReserveError::InvalidAmount);
        }

        let resource = self.get(resource_id).await?;
        if !resource.capacity_model.is_windowed() {
            return Err(ReserveError::CapacityNotUpdatable(resource_id));
        }

        let mut load = ResourceLoad::new();
        for recorded in self.ledger.load(resource_id, None).await? {
            load.apply(&recorded);
        }
        let committed = load.peak_committed(self.clock.now());
        if u64::from(new_capacity.value()) < committed {
            return Err(ReserveError::CapacityBelowCommitted {
                committed,
                requested: u64::from(new_capacity.value()),
            });
        }

        let mut resources = self.resources.write().await;
        let resource = resources
            .get_mut(&resource_id)
            .ok_or(ReserveError::ResourceNotFound(resource_id))?;
        resource.capacity_model = if new_capacity.value() == 1 {
            match resource.capacity_model {
                CapacityModel::Exclusive => CapacityModel::Exclusive,
                _ => CapacityModel::Concurrent(new_capacity),
            }
        } else {
            CapacityModel::Concurrent(new_capacity)
        };
        tracing::info!(
            resource_id = %resource_id,
            capacity = %new_capacity,
            "resource capacity updated"
        );
        Ok(resource.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use chrono::Utc;
    use innkeep_core::environment::SystemClock;
    use innkeep_core::ids::{HolderId, ReservationId};
    use innkeep_core::window::TimeWindow;

    fn catalog() -> (ResourceCatalog, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let catalog = ResourceCatalog::new(
            Arc::<MemoryLedger>::clone(&ledger),
            Arc::new(SystemClock),
        );
        (catalog, ledger)
    }

    fn table_spec(capacity: u32) -> ResourceSpec {
        ResourceSpec {
            property_id: PropertyId::new(),
            kind: ResourceKind::Table,
            capacity_model: CapacityModel::Concurrent(Capacity::new(capacity)),
            name: "Table 4".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (catalog, _) = catalog();
        let created = catalog.create(table_spec(6)).await.unwrap();
        let fetched = catalog.get(created.resource_id).await.unwrap();
        assert_eq!(fetched.name, "Table 4");
        assert_eq!(fetched.occupancy_limit(), 6);
        assert!(catalog.get(ResourceId::new()).await.is_err());
    }

    #[tokio::test]
    async fn inventory_creation_seeds_a_load_movement() {
        let (catalog, ledger) = catalog();
        let created = catalog
            .create(ResourceSpec {
                property_id: PropertyId::new(),
                kind: ResourceKind::InventoryItem,
                capacity_model: CapacityModel::Quantity { initial_stock: 25 },
                name: "Pool towels".to_string(),
            })
            .await
            .unwrap();

        let events = ledger.load(created.resource_id, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].event,
            LedgerEvent::StockRecorded {
                movement: StockMovement::Load(25),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_committed_load() {
        let (catalog, ledger) = catalog();
        let table = catalog.create(table_spec(8)).await.unwrap();

        // Commit a party of 5 directly onto the ledger
        ledger
            .append(
                table.resource_id,
                None,
                vec![LedgerEvent::ReservationCommitted {
                    reservation_id: ReservationId::new(),
                    resource_id: table.resource_id,
                    holder_id: HolderId::new(),
                    window: Some(TimeWindow::Slot {
                        starts_at: Utc::now(),
                        ends_at: Utc::now() + chrono::Duration::hours(2),
                    }),
                    amount: 5,
                    committed_at: Utc::now(),
                }],
            )
            .await
            .unwrap();

        let refused = catalog
            .update_capacity(table.resource_id, Capacity::new(4))
            .await;
        assert!(matches!(
            refused,
            Err(ReserveError::CapacityBelowCommitted {
                committed: 5,
                requested: 4
            })
        ));

        let grown = catalog
            .update_capacity(table.resource_id, Capacity::new(10))
            .await
            .unwrap();
        assert_eq!(grown.occupancy_limit(), 10);
    }

    #[tokio::test]
    async fn stock_capacity_is_not_updatable() {
        let (catalog, _) = catalog();
        let item = catalog
            .create(ResourceSpec {
                property_id: PropertyId::new(),
                kind: ResourceKind::InventoryItem,
                capacity_model: CapacityModel::Quantity { initial_stock: 5 },
                name: "Cases".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(
            catalog
                .update_capacity(item.resource_id, Capacity::new(9))
                .await,
            Err(ReserveError::CapacityNotUpdatable(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_kind() {
        let (catalog, _) = catalog();
        catalog.create(table_spec(4)).await.unwrap();
        catalog
            .create(ResourceSpec {
                property_id: PropertyId::new(),
                kind: ResourceKind::Room,
                capacity_model: CapacityModel::Exclusive,
                name: "Room 101".to_string(),
            })
            .await
            .unwrap();

        let rooms = catalog.list(None, Some(ResourceKind::Room)).await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].kind, ResourceKind::Room);
        assert_eq!(catalog.list(None, None).await.len(), 2);
    }
}
