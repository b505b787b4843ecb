//! Availability query endpoint.
//!
//! `POST /api/availability/query`: advisory listing of free capacity over
//! a window. The response may trail the ledger slightly; the coordinator
//! re-validates before any commit.

use axum::{extract::State, Json};
use innkeep_core::ids::PropertyId;
use innkeep_core::resource::ResourceKind;
use innkeep_engine::{AvailabilityCandidate, AvailabilityQuery};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WindowBody;
use crate::error::AppError;
use crate::state::AppState;

/// Availability query request body.
#[derive(Debug, Deserialize)]
pub struct QueryAvailabilityRequest {
    /// Restrict to one resource kind
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    /// Restrict to one property
    #[serde(default)]
    pub property_id: Option<Uuid>,
    /// Window to check; required for time-windowed kinds
    #[serde(default)]
    pub window: Option<WindowBody>,
    /// Minimum free capacity a candidate must offer
    #[serde(default)]
    pub min_amount: u64,
}

/// Availability query response body.
#[derive(Debug, Serialize)]
pub struct QueryAvailabilityResponse {
    /// Bookable candidates, best-supplied first
    pub candidates: Vec<AvailabilityCandidate>,
}

/// List free capacity for the requested kind/property/window.
///
/// # Errors
///
/// `422` when a windowed kind is queried without a usable window.
pub async fn query_availability(
    State(state): State<AppState>,
    Json(request): Json<QueryAvailabilityRequest>,
) -> Result<Json<QueryAvailabilityResponse>, AppError> {
    let window = request.window.map(WindowBody::into_window).transpose()?;
    let candidates = state
        .query
        .query(AvailabilityQuery {
            kind: request.kind,
            property_id: request.property_id.map(PropertyId::from_uuid),
            window,
            min_amount: request.min_amount,
        })
        .await?;
    Ok(Json(QueryAvailabilityResponse { candidates }))
}
