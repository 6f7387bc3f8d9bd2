//! Reservation handlers: create, fetch, list, update, the named transitions,
//! the admin override and payment reconciliation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;

use crate::api::dto::{
    DetailQuery, PaymentStatusRequest, ReservationRequest, ReservationResponse,
    StatusChangeRequest, status_filter,
};
use crate::api::extract::{Actor, AdminToken};
use crate::app_state::AppState;
use crate::domain::{
    PaymentId, PaymentTransaction, ReservationDetail, ReservationDraft, ReservationId,
};
use crate::error::{ErrorResponse, ReservationError};
use crate::persistence::ReservationStore;
use crate::service::AdminOverride;

fn respond(detail: ReservationDetail) -> Json<ReservationResponse> {
    Json(ReservationResponse::from(detail))
}

fn respond_all(details: Vec<ReservationDetail>) -> Json<Vec<ReservationResponse>> {
    Json(details.into_iter().map(ReservationResponse::from).collect())
}

/// `POST /reservation` — Book a table or event slot.
///
/// # Errors
///
/// Returns [`ReservationError`] on invalid input or a taken slot.
#[utoipa::path(
    post,
    path = "/reservation",
    tag = "Reservations",
    summary = "Create a reservation",
    description = "Books tables at a time slot or an event type for a shift. The slot check, code generation and inserts run in one transaction; a taken slot is a 409.",
    request_body = ReservationRequest,
    params(("x-user-id" = Option<i64>, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Table or event slot unavailable", body = ErrorResponse),
    )
)]
pub async fn create_reservation<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Json(req): Json<ReservationRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let draft = ReservationDraft::try_from(req)?;
    let detail = state.reservation_service.create(draft, actor).await?;
    Ok((StatusCode::CREATED, respond(detail)))
}

/// `GET /reservation/{id}` — Reservation with its line items.
///
/// # Errors
///
/// Returns [`ReservationError::ReservationNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/reservation/{id}",
    tag = "Reservations",
    summary = "Get a reservation",
    description = "Returns the reservation and its active line items. `include_inactive=true` adds superseded items for audit.",
    params(("id" = i64, Path, description = "Reservation id"), DetailQuery),
    responses(
        (status = 200, description = "Reservation found", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
    )
)]
pub async fn get_reservation<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let detail = state
        .reservation_service
        .get(ReservationId::new(id), query.include_inactive)
        .await?;
    Ok(respond(detail))
}

/// `GET /reservation/customer/{customer_id}` — Reservations of a customer.
///
/// # Errors
///
/// Returns [`ReservationError`] on storage failure.
#[utoipa::path(
    get,
    path = "/reservation/customer/{customer_id}",
    tag = "Reservations",
    summary = "List reservations by customer",
    description = "Every reservation of the customer, most recent date first.",
    params(("customer_id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReservationResponse>),
    )
)]
pub async fn list_by_customer<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path(customer_id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let details = state
        .reservation_service
        .list_by_customer(customer_id)
        .await?;
    Ok(respond_all(details))
}

/// `GET /reservation/date/{date}/status/{status}` — Reservations of a day.
///
/// # Errors
///
/// Returns [`ReservationError::InvalidStatus`] for an unknown status.
#[utoipa::path(
    get,
    path = "/reservation/date/{date}/status/{status}",
    tag = "Reservations",
    summary = "List reservations by date",
    description = "Reservations on the date in time order. `ALL` disables the status filter.",
    params(
        ("date" = String, Path, description = "Date, YYYY-MM-DD"),
        ("status" = String, Path, description = "Status or ALL"),
    ),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReservationResponse>),
        (status = 400, description = "Unknown status", body = ErrorResponse),
    )
)]
pub async fn list_by_date<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Path((date, status)): Path<(NaiveDate, String)>,
) -> Result<impl IntoResponse, ReservationError> {
    let status = status_filter(&status)?;
    let details = state.reservation_service.list_by_date(date, status).await?;
    Ok(respond_all(details))
}

/// `PUT /reservation/{id}` — Replace a reservation and its line items.
///
/// # Errors
///
/// Returns [`ReservationError`] for an unknown or inactive reservation,
/// invalid input or a taken slot.
#[utoipa::path(
    put,
    path = "/reservation/{id}",
    tag = "Reservations",
    summary = "Update a reservation",
    description = "Full replace. Existing line items are deactivated and the submitted ones become the active set. Status and code are kept.",
    request_body = ReservationRequest,
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
        (status = 409, description = "Table or event slot unavailable", body = ErrorResponse),
        (status = 422, description = "Reservation is inactive", body = ErrorResponse),
    )
)]
pub async fn update_reservation<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    Json(req): Json<ReservationRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let draft = ReservationDraft::try_from(req)?;
    let detail = state
        .reservation_service
        .update(ReservationId::new(id), draft, actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/cancel`
///
/// # Errors
///
/// Returns [`ReservationError`] when the reservation cannot be cancelled.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/cancel",
    tag = "Reservations",
    summary = "Cancel a reservation",
    description = "Releases the reservation's slots. Cancelling twice is a 409.",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn cancel<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let detail = state
        .reservation_service
        .cancel(ReservationId::new(id), actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/checkin`
///
/// # Errors
///
/// Returns [`ReservationError`] when the reservation is not pending.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/checkin",
    tag = "Reservations",
    summary = "Check in",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Checked in", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn check_in<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let detail = state
        .reservation_service
        .check_in(ReservationId::new(id), actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/checkout`
///
/// # Errors
///
/// Returns [`ReservationError`] when the reservation is not checked in.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/checkout",
    tag = "Reservations",
    summary = "Check out",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Checked out", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn check_out<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let detail = state
        .reservation_service
        .check_out(ReservationId::new(id), actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/paid`
///
/// # Errors
///
/// Returns [`ReservationError`] for a cancelled reservation.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/paid",
    tag = "Reservations",
    summary = "Mark paid",
    description = "Idempotent: repeating it on a paid reservation succeeds.",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Marked paid", body = ReservationResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn mark_paid<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    let detail = state
        .reservation_service
        .mark_paid(ReservationId::new(id), actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/status` — Administrative status override.
///
/// # Errors
///
/// Returns [`ReservationError::Forbidden`] without a valid admin token.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/status",
    tag = "Reservations",
    summary = "Force a status",
    description = "Writes any status without transition checks. Requires `x-admin-token`; disabled when no token is configured.",
    request_body = StatusChangeRequest,
    params(
        ("id" = i64, Path, description = "Reservation id"),
        ("x-admin-token" = String, Header, description = "Administrative token"),
    ),
    responses(
        (status = 200, description = "Status written", body = ReservationResponse),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 403, description = "Missing or wrong token", body = ErrorResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
    )
)]
pub async fn override_status<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    AdminToken(token): AdminToken,
    Path(id): Path<i64>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let grant = AdminOverride::authorize(
        state.config.admin_override_token.as_deref(),
        token.as_deref(),
    )?;
    let target = req.target()?;
    let detail = state
        .reservation_service
        .override_status(ReservationId::new(id), target, grant, actor)
        .await?;
    Ok(respond(detail))
}

/// `PATCH /reservation/{id}/payments/{payment_id}` — Payment gateway callback.
///
/// # Errors
///
/// Returns [`ReservationError::PaymentNotFound`] if the payment does not
/// belong to the reservation.
#[utoipa::path(
    patch,
    path = "/reservation/{id}/payments/{payment_id}",
    tag = "Reservations",
    summary = "Reconcile a payment",
    description = "Records the gateway status and reference of one payment. The reservation status is not touched.",
    request_body = PaymentStatusRequest,
    params(
        ("id" = i64, Path, description = "Reservation id"),
        ("payment_id" = i64, Path, description = "Payment transaction id"),
    ),
    responses(
        (status = 200, description = "Payment updated", body = PaymentTransaction),
        (status = 404, description = "Reservation or payment not found", body = ErrorResponse),
    )
)]
pub async fn reconcile_payment<S: ReservationStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path((id, payment_id)): Path<(i64, i64)>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let payment = state
        .reservation_service
        .reconcile_payment(
            ReservationId::new(id),
            PaymentId::new(payment_id),
            req.into(),
            actor,
        )
        .await?;
    Ok(Json(payment))
}

/// Reservation routes.
pub fn routes<S: ReservationStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/reservation", post(create_reservation::<S>))
        .route(
            "/reservation/{id}",
            get(get_reservation::<S>).put(update_reservation::<S>),
        )
        .route(
            "/reservation/customer/{customer_id}",
            get(list_by_customer::<S>),
        )
        .route(
            "/reservation/date/{date}/status/{status}",
            get(list_by_date::<S>),
        )
        .route("/reservation/{id}/cancel", patch(cancel::<S>))
        .route("/reservation/{id}/checkin", patch(check_in::<S>))
        .route("/reservation/{id}/checkout", patch(check_out::<S>))
        .route("/reservation/{id}/paid", patch(mark_paid::<S>))
        .route("/reservation/{id}/status", patch(override_status::<S>))
        .route(
            "/reservation/{id}/payments/{payment_id}",
            patch(reconcile_payment::<S>),
        )
}
