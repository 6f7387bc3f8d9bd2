//! Availability handlers: single-slot checks and the day grids.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    EventAvailabilityQuery, EventShiftQuery, ScheduleQuery, TableAvailabilityQuery,
};
use crate::app_state::AppState;
use crate::domain::{ScheduleSlot, ShiftAvailability};
use crate::error::{ErrorResponse, ReservationError};
use crate::persistence::ReservationStore;

/// `GET /reservation/table-availability` — Is a table free at a slot?
///
/// # Errors
///
/// Returns [`ReservationError::InvalidRequest`] for a malformed time.
#[utoipa::path(
    get,
    path = "/reservation/table-availability",
    tag = "Availability",
    summary = "Check a table slot",
    description = "`false` iff a live booking holds the table at exactly this date and time.",
    params(TableAvailabilityQuery),
    responses(
        (status = 200, description = "Availability flag", body = bool),
        (status = 400, description = "Malformed time", body = ErrorResponse),
    )
)]
pub async fn table_availability<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<TableAvailabilityQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let time = query.time()?;
    let available = state
        .availability_service
        .is_table_available(query.table_id, query.date, time)
        .await?;
    Ok(Json(available))
}

/// `GET /reservation/event-availability` — Is an event slot free?
///
/// # Errors
///
/// Returns [`ReservationError::InvalidShift`] for an unknown shift.
#[utoipa::path(
    get,
    path = "/reservation/event-availability",
    tag = "Availability",
    summary = "Check an event slot",
    description = "`false` iff a live event reservation holds the event type for the shift on the date.",
    params(EventAvailabilityQuery),
    responses(
        (status = 200, description = "Availability flag", body = bool),
        (status = 400, description = "Unknown shift", body = ErrorResponse),
    )
)]
pub async fn event_availability<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<EventAvailabilityQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let shift = query.shift()?;
    let available = state
        .availability_service
        .is_event_available(query.event_type_id, query.date, shift)
        .await?;
    Ok(Json(available))
}

/// `GET /reservation/availability` — Full-day table grid.
///
/// # Errors
///
/// Returns [`ReservationError`] on storage failure.
#[utoipa::path(
    get,
    path = "/reservation/availability",
    tag = "Availability",
    summary = "Day schedule",
    description = "Sixteen hourly slots (08-11, 13-17, 19-23) with every active table's availability.",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedule grid", body = Vec<ScheduleSlot>),
    )
)]
pub async fn schedule<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    Ok(Json(state.availability_service.schedule(query.date).await?))
}

/// `GET /reservation/event-shifts/availability` — Event shift grid.
///
/// # Errors
///
/// Returns [`ReservationError`] on storage failure.
#[utoipa::path(
    get,
    path = "/reservation/event-shifts/availability",
    tag = "Availability",
    summary = "Event shifts of a day",
    description = "Splits the three shift codes into available and occupied, optionally for one event type.",
    params(EventShiftQuery),
    responses(
        (status = 200, description = "Shift grid", body = ShiftAvailability),
    )
)]
pub async fn event_shifts<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<EventShiftQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let shifts = state
        .availability_service
        .event_shifts(query.date, query.event_type_id)
        .await?;
    Ok(Json(shifts))
}

/// Availability routes.
pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/reservation/table-availability",
            get(table_availability::<S>),
        )
        .route(
            "/reservation/event-availability",
            get(event_availability::<S>),
        )
        .route("/reservation/availability", get(schedule::<S>))
        .route(
            "/reservation/event-shifts/availability",
            get(event_shifts::<S>),
        )
}
