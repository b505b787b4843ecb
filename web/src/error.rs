//! Error types for web handlers.
//!
//! Bridges the engine's typed [`ReserveError`] taxonomy to HTTP
//! responses. Conflicts carry the first conflicting night or sub-window in
//! the body so callers can retry intelligently instead of resubmitting the
//! same request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use innkeep_core::error::ReserveError;
use innkeep_core::window::TimeWindow;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// First conflicting night/sub-window, for capacity conflicts
    conflicting_window: Option<TimeWindow>,
    /// Free capacity at the conflicting point, for capacity conflicts
    available: Option<u64>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            conflicting_window: None,
            available: None,
        }
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<ReserveError> for AppError {
    fn from(error: ReserveError) -> Self {
        let message = error.to_string();
        match error {
            ReserveError::Conflict {
                window, available, ..
            } => Self {
                status: StatusCode::CONFLICT,
                message,
                code: "CONFLICT".to_string(),
                conflicting_window: window,
                available: Some(available),
            },
            ReserveError::ResourceNotFound(_) | ReserveError::ReservationNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND".to_string())
            }
            ReserveError::InvalidWindow { .. } | ReserveError::InvalidAmount => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                message,
                "VALIDATION_ERROR".to_string(),
            ),
            ReserveError::CapacityBelowCommitted { .. } => Self::new(
                StatusCode::CONFLICT,
                message,
                "CAPACITY_BELOW_COMMITTED".to_string(),
            ),
            ReserveError::CapacityNotUpdatable(_) => Self::new(
                StatusCode::CONFLICT,
                message,
                "CAPACITY_NOT_UPDATABLE".to_string(),
            ),
            ReserveError::ReleaseExceedsReservation { .. } => Self::new(
                StatusCode::CONFLICT,
                message,
                "RELEASE_EXCEEDS_RESERVATION".to_string(),
            ),
            ReserveError::InvalidTransition { .. } => Self::new(
                StatusCode::CONFLICT,
                message,
                "INVALID_TRANSITION".to_string(),
            ),
            // Retryable: the per-resource lock wait was exhausted
            ReserveError::LockTimeout { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                message,
                "LOCK_TIMEOUT".to_string(),
            ),
            ReserveError::Ledger(inner) => {
                tracing::error!(error = %inner, "ledger failure behind HTTP request");
                Self::internal("An internal error occurred")
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
    /// First conflicting night/sub-window, present on capacity conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicting_window: Option<TimeWindow>,
    /// Free capacity at the conflicting point, present on capacity
    /// conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                "Internal server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            conflicting_window: self.conflicting_window,
            available: self.available,
        };

        (self.status, Json(body)).into_response()
    }
}
