//! REST endpoint handlers organized by resource.

pub mod availability;
pub mod notification;
pub mod reservation;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::persistence::ReservationStore;

/// Composes all resource routes.
pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .merge(reservation::routes())
        .merge(availability::routes())
        .merge(notification::routes())
}
