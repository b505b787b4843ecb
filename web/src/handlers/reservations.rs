//! Reservation endpoints.
//!
//! - `POST /api/reservations` - atomic check-and-commit (or hold)
//! - `GET /api/reservations/:id` - current status, expiry folded in
//! - `POST /api/reservations/:id/confirm|cancel|release` - transitions
//!
//! `409 Conflict` responses carry the first conflicting night or
//! sub-window so the caller can pick another candidate instead of
//! resubmitting blind.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use innkeep_core::ids::{HolderId, ReservationId, ResourceId};
use innkeep_core::reservation::{Reservation, ReserveMode};
use innkeep_engine::ReserveRequest;
use serde::Deserialize;
use uuid::Uuid;

use super::WindowBody;
use crate::error::AppError;
use crate::state::AppState;

/// How the caller wants the reservation committed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModeBody {
    /// Validate and confirm in one step
    #[default]
    Commit,
    /// Create a TTL-bounded hold, finalized later via `:confirm`
    Hold,
}

/// Reservation creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Resource to commit
    pub resource_id: Uuid,
    /// Party the reservation is held for (opaque, externally issued)
    pub holder_id: Uuid,
    /// Window requested; omitted for inventory items
    #[serde(default)]
    pub window: Option<WindowBody>,
    /// Occupants or stock units (defaults to 1)
    #[serde(default = "default_amount")]
    pub amount: u64,
    /// Commit immediately or hold
    #[serde(default)]
    pub mode: ModeBody,
    /// Hold TTL in seconds; required when `mode` is `hold`
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

const fn default_amount() -> u64 {
    1
}

/// Atomic check-and-commit for one resource/window/amount request.
///
/// # Errors
///
/// `409` on capacity conflict, `404` for unknown resources, `422` for
/// malformed windows, `503` when the resource lock wait is exhausted.
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let mode = match (request.mode, request.ttl_seconds) {
        (ModeBody::Commit, _) => ReserveMode::Commit,
        (ModeBody::Hold, Some(ttl_seconds)) => ReserveMode::Hold { ttl_seconds },
        (ModeBody::Hold, None) => {
            return Err(AppError::validation("hold mode requires ttl_seconds"))
        }
    };
    let window = request.window.map(WindowBody::into_window).transpose()?;

    let reservation = state
        .coordinator
        .reserve(ReserveRequest {
            resource_id: ResourceId::from_uuid(request.resource_id),
            window,
            amount: request.amount,
            holder_id: HolderId::from_uuid(request.holder_id),
            mode,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Current reservation state, with check-on-read expiry applied.
///
/// # Errors
///
/// `404` for unknown reservations.
pub async fn get_reservation(
    Path(reservation_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state
        .coordinator
        .get_reservation(ReservationId::from_uuid(reservation_id))
        .await?;
    Ok(Json(reservation))
}

/// Finalize a pending hold.
///
/// # Errors
///
/// `404` for unknown reservations, `409` when the hold already expired or
/// was finalized.
pub async fn confirm_reservation(
    Path(reservation_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state
        .coordinator
        .confirm(ReservationId::from_uuid(reservation_id))
        .await?;
    Ok(Json(reservation))
}

/// Annul a confirmed reservation.
///
/// # Errors
///
/// `404` for unknown reservations, `409` on illegal transitions.
pub async fn cancel_reservation(
    Path(reservation_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state
        .coordinator
        .cancel(ReservationId::from_uuid(reservation_id))
        .await?;
    Ok(Json(reservation))
}

/// Release a confirmed reservation back to the pool.
///
/// # Errors
///
/// `404` for unknown reservations, `409` on illegal transitions.
pub async fn release_reservation(
    Path(reservation_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state
        .coordinator
        .release(ReservationId::from_uuid(reservation_id))
        .await?;
    Ok(Json(reservation))
}
