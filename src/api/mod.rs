//! REST API layer: route handlers, DTOs, header extractors, the OpenAPI
//! document and router composition.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;
use crate::persistence::ReservationStore;

/// Builds the complete API router with all REST endpoints.
pub fn build_router<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes())
}
