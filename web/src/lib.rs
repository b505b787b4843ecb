//! # Innkeep Web
//!
//! Axum HTTP surface over the reservation engine.
//!
//! The web layer is deliberately thin: deserialize, call the engine, map
//! the typed error taxonomy to status codes. Capacity conflicts answer
//! `409` with the first conflicting night or sub-window in the body;
//! exhausted lock waits answer a retryable `503`.
//!
//! Identity is an opaque `holder_id` supplied by the caller (the identity
//! collaborator authenticates upstream); pricing and notification
//! delivery are external collaborators as well.

pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use routes::app;
pub use state::AppState;
