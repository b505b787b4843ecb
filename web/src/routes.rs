//! Route table.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{availability, health, reservations, resources};
use crate::state::AppState;

/// Builds the HTTP application over the engine services.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/availability/query",
            post(availability::query_availability),
        )
        .route("/api/reservations", post(reservations::create_reservation))
        .route(
            "/api/reservations/:id",
            get(reservations::get_reservation),
        )
        .route(
            "/api/reservations/:id/confirm",
            post(reservations::confirm_reservation),
        )
        .route(
            "/api/reservations/:id/cancel",
            post(reservations::cancel_reservation),
        )
        .route(
            "/api/reservations/:id/release",
            post(reservations::release_reservation),
        )
        .route("/api/resources", post(resources::create_resource))
        .route("/api/resources/:id", get(resources::get_resource))
        .route(
            "/api/resources/:id/capacity",
            post(resources::update_capacity),
        )
        .route("/api/resources/:id/stock", post(resources::record_stock))
        .route(
            "/api/resources/:id/stock/release",
            post(resources::release_stock),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
