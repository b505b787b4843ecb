//! Shared application state for web handlers.

use std::sync::Arc;

use innkeep_engine::{AvailabilityQueryService, ReservationCoordinator, ResourceCatalog};

/// State shared by every handler: the engine's three public services.
#[derive(Clone)]
pub struct AppState {
    /// Resource catalog
    pub catalog: Arc<ResourceCatalog>,
    /// The transactional coordinator
    pub coordinator: Arc<ReservationCoordinator>,
    /// Advisory availability queries
    pub query: Arc<AvailabilityQueryService>,
}

impl AppState {
    /// Bundles the engine services into handler state.
    #[must_use]
    pub fn new(
        catalog: Arc<ResourceCatalog>,
        coordinator: Arc<ReservationCoordinator>,
        query: Arc<AvailabilityQueryService>,
    ) -> Self {
        Self {
            catalog,
            coordinator,
            query,
        }
    }
}
