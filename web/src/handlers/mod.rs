//! HTTP handlers.
//!
//! Thin layer over the engine: deserialize, call the coordinator or query
//! service, map typed errors to status codes. No business rules live here.

pub mod availability;
pub mod reservations;
pub mod resources;

use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use innkeep_core::window::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Wire form of a time window: either a nightly stay (`check_in` /
/// `check_out`) or a clock slot (`starts_at` / `ends_at`).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WindowBody {
    /// First occupied night of a stay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    /// Checkout date (exclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    /// Start of a slot (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    /// End of a slot (exclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl WindowBody {
    /// Converts the wire form into a domain window.
    ///
    /// # Errors
    ///
    /// Returns a 422 [`AppError`] when the fields mix granularities or
    /// leave one end open.
    pub fn into_window(self) -> Result<TimeWindow, AppError> {
        match (self.check_in, self.check_out, self.starts_at, self.ends_at) {
            (Some(check_in), Some(check_out), None, None) => Ok(TimeWindow::Nights {
                check_in,
                check_out,
            }),
            (None, None, Some(starts_at), Some(ends_at)) => Ok(TimeWindow::Slot {
                starts_at,
                ends_at,
            }),
            _ => Err(AppError::validation(
                "window must be either check_in/check_out or starts_at/ends_at",
            )),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: &'static str,
}

/// Liveness endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_body_rejects_mixed_granularity() {
        let mixed = WindowBody {
            check_in: "2024-06-01".parse().ok(),
            check_out: None,
            starts_at: None,
            ends_at: None,
        };
        assert!(mixed.into_window().is_err());

        let stay = WindowBody {
            check_in: "2024-06-01".parse().ok(),
            check_out: "2024-06-03".parse().ok(),
            starts_at: None,
            ends_at: None,
        };
        assert!(matches!(
            stay.into_window(),
            Ok(TimeWindow::Nights { .. })
        ));
    }
}
