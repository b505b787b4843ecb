//! Resource catalog and stock ledger endpoints.
//!
//! - `POST /api/resources` / `GET /api/resources/:id`
//! - `POST /api/resources/:id/capacity` - growth validated against
//!   committed load
//! - `POST /api/resources/:id/stock` - movement ledger (load, waste,
//!   adjust)
//! - `POST /api/resources/:id/stock/release` - partial return of a
//!   holder's reserved stock

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use innkeep_core::event::StockMovement;
use innkeep_core::ids::{HolderId, PropertyId, ResourceId};
use innkeep_core::resource::{Capacity, CapacityModel, Resource, ResourceKind, ResourceSpec};
use innkeep_engine::StockLevels;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Resource creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    /// Owning property
    pub property_id: Uuid,
    /// Kind of bookable thing
    pub kind: ResourceKind,
    /// Human-facing label
    pub name: String,
    /// Concurrent capacity; required for tables and service slots
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Opening stock; inventory items only
    #[serde(default)]
    pub initial_stock: Option<u64>,
}

/// Register a new resource.
///
/// # Errors
///
/// `422` when the capacity fields do not fit the kind.
pub async fn create_resource(
    State(state): State<AppState>,
    Json(request): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), AppError> {
    let capacity_model = match request.kind {
        ResourceKind::Room => CapacityModel::Exclusive,
        ResourceKind::Table | ResourceKind::ServiceSlot => {
            let Some(capacity) = request.capacity else {
                return Err(AppError::validation(format!(
                    "a {} needs an explicit capacity",
                    request.kind
                )));
            };
            CapacityModel::Concurrent(Capacity::new(capacity))
        }
        ResourceKind::InventoryItem => CapacityModel::Quantity {
            initial_stock: request.initial_stock.unwrap_or(0),
        },
    };

    let resource = state
        .catalog
        .create(ResourceSpec {
            property_id: PropertyId::from_uuid(request.property_id),
            kind: request.kind,
            capacity_model,
            name: request.name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// Fetch one resource.
///
/// # Errors
///
/// `404` for unknown ids.
pub async fn get_resource(
    Path(resource_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .catalog
        .get(ResourceId::from_uuid(resource_id))
        .await?;
    Ok(Json(resource))
}

/// Capacity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCapacityRequest {
    /// New occupancy ceiling
    pub capacity: u32,
}

/// Change a resource's occupancy ceiling.
///
/// # Errors
///
/// `409` when the new capacity is below the committed load or the
/// resource holds stock instead of occupancy.
pub async fn update_capacity(
    Path(resource_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<UpdateCapacityRequest>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .catalog
        .update_capacity(
            ResourceId::from_uuid(resource_id),
            Capacity::new(request.capacity),
        )
        .await?;
    Ok(Json(resource))
}

/// Wire form of a stock movement.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "movement")]
pub enum MovementBody {
    /// Stock received into inventory
    Load {
        /// Units received
        quantity: u64,
    },
    /// Stock destroyed or spoiled
    Waste {
        /// Units removed
        quantity: u64,
    },
    /// Signed correction after a physical count
    Adjust {
        /// Delta, may be negative
        delta: i64,
    },
}

impl From<MovementBody> for StockMovement {
    fn from(body: MovementBody) -> Self {
        match body {
            MovementBody::Load { quantity } => Self::Load(quantity),
            MovementBody::Waste { quantity } => Self::Waste(quantity),
            MovementBody::Adjust { delta } => Self::Adjust(delta),
        }
    }
}

/// Stock levels response body.
#[derive(Debug, Serialize)]
pub struct StockLevelsResponse {
    /// Stock on hand
    pub current_stock: u64,
    /// Stock held by live reservations
    pub reserved_stock: u64,
    /// `current_stock - reserved_stock`
    pub available: u64,
}

impl From<StockLevels> for StockLevelsResponse {
    fn from(levels: StockLevels) -> Self {
        Self {
            current_stock: levels.current_stock,
            reserved_stock: levels.reserved_stock,
            available: levels.available(),
        }
    }
}

/// Append a stock movement to an inventory item's ledger.
///
/// # Errors
///
/// `409` when the movement would push stock on hand below the reserved
/// amount; `422` on non-inventory resources.
pub async fn record_stock(
    Path(resource_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<MovementBody>,
) -> Result<Json<StockLevelsResponse>, AppError> {
    let levels = state
        .coordinator
        .record_stock(ResourceId::from_uuid(resource_id), request.into())
        .await?;
    Ok(Json(levels.into()))
}

/// Stock release request body.
#[derive(Debug, Deserialize)]
pub struct ReleaseStockRequest {
    /// Holder returning the stock
    pub holder_id: Uuid,
    /// Units to return
    pub amount: u64,
}

/// Return part of a holder's reserved stock.
///
/// # Errors
///
/// `409` when the release exceeds the holder's outstanding amount.
pub async fn release_stock(
    Path(resource_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<ReleaseStockRequest>,
) -> Result<Json<StockLevelsResponse>, AppError> {
    let levels = state
        .coordinator
        .release_stock(
            ResourceId::from_uuid(resource_id),
            HolderId::from_uuid(request.holder_id),
            request.amount,
        )
        .await?;
    Ok(Json(levels.into()))
}
