//! Notification handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::NotificationRequest;
use crate::api::extract::Actor;
use crate::app_state::AppState;
use crate::domain::{Notification, NotificationId, ReservationId};
use crate::error::{ErrorResponse, ReservationError};
use crate::persistence::ReservationStore;

/// `POST /notification` — Record a notification for a reservation.
///
/// # Errors
///
/// Returns [`ReservationError::ReservationNotFound`] for an unknown
/// reservation.
#[utoipa::path(
    post,
    path = "/notification",
    tag = "Notifications",
    summary = "Record a notification",
    description = "Stores a notification intent. Pending ones are picked up by the delivery outbox.",
    request_body = NotificationRequest,
    responses(
        (status = 201, description = "Notification recorded", body = Notification),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
    )
)]
pub async fn create_notification<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Json(req): Json<NotificationRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let record = state
        .notification_service
        .record(req.into_new(actor))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /notification/reservation/{reservation_id}`
///
/// # Errors
///
/// Returns [`ReservationError`] on storage failure.
#[utoipa::path(
    get,
    path = "/notification/reservation/{reservation_id}",
    tag = "Notifications",
    summary = "List notifications of a reservation",
    description = "Oldest first.",
    params(("reservation_id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
    )
)]
pub async fn list_for_reservation<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(reservation_id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let records = state
        .notification_service
        .list_for_reservation(ReservationId::new(reservation_id))
        .await?;
    Ok(Json(records))
}

/// `GET /notification/{id}`
///
/// # Errors
///
/// Returns [`ReservationError::NotificationNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/notification/{id}",
    tag = "Notifications",
    summary = "Get a notification",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification found", body = Notification),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn get_notification<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let record = state
        .notification_service
        .get(NotificationId::new(id))
        .await?;
    Ok(Json(record))
}

/// Notification routes.
pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/notification", post(create_notification::<S>))
        .route(
            "/notification/reservation/{reservation_id}",
            get(list_for_reservation::<S>),
        )
        .route("/notification/{id}", get(get_notification::<S>))
}
