//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::api::dto::{
    EventServiceRequest, NotificationRequest, PaymentRequest, PaymentStatusRequest,
    ProductLineRequest, ReservationRequest, ReservationResponse, ShiftInput,
    StatusChangeRequest, TableLineRequest,
};
use crate::api::handlers::{availability, notification, reservation, system};
use crate::domain::{
    Audit, EventServiceLine, EventShift, Holder, Notification, NotificationChannel,
    NotificationStatus, NotificationType, PaymentTransaction, ProductLine, Reservation,
    ReservationStatus, ReservationType, ScheduleSlot, ShiftAvailability, TableBooking,
    TableSlotAvailability,
};
use crate::error::{ErrorBody, ErrorResponse};

/// Reservation service API description.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Reservation Service",
        description = "Reservation lifecycle, table and event availability, and customer notifications."
    ),
    paths(
        reservation::create_reservation,
        reservation::get_reservation,
        reservation::list_by_customer,
        reservation::list_by_date,
        reservation::update_reservation,
        reservation::cancel,
        reservation::check_in,
        reservation::check_out,
        reservation::mark_paid,
        reservation::override_status,
        reservation::reconcile_payment,
        availability::table_availability,
        availability::event_availability,
        availability::schedule,
        availability::event_shifts,
        notification::create_notification,
        notification::list_for_reservation,
        notification::get_notification,
        system::health_handler,
    ),
    components(schemas(
        ReservationRequest,
        ReservationResponse,
        TableLineRequest,
        ProductLineRequest,
        EventServiceRequest,
        PaymentRequest,
        PaymentStatusRequest,
        StatusChangeRequest,
        ShiftInput,
        NotificationRequest,
        Reservation,
        Audit,
        Holder,
        TableBooking,
        ProductLine,
        EventServiceLine,
        PaymentTransaction,
        Notification,
        NotificationType,
        NotificationChannel,
        NotificationStatus,
        ReservationStatus,
        ReservationType,
        EventShift,
        ScheduleSlot,
        TableSlotAvailability,
        ShiftAvailability,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Reservations", description = "Reservation lifecycle"),
        (name = "Availability", description = "Table and event availability"),
        (name = "Notifications", description = "Customer notifications"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/reservation",
            "/reservation/{id}",
            "/reservation/{id}/status",
            "/reservation/event-shifts/availability",
            "/notification/{id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
