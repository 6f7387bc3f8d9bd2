//! Domain layer: the reservation aggregate, its value types and the event
//! system.
//!
//! Nothing in here touches storage or HTTP. The types carry the invariants
//! that hold regardless of backend: the status transition table, code
//! format, draft validation and the fixed schedule grid.

pub mod code;
pub mod event_bus;
pub mod ids;
pub mod line_items;
pub mod notification;
pub mod reservation;
pub mod reservation_event;
pub mod schedule;
pub mod status;

pub use code::ReservationCode;
pub use event_bus::{EventBus, NotificationWakeups};
pub use ids::{LineItemId, NotificationId, PaymentId, ReservationId};
pub use line_items::{
    EventServiceDraft, EventServiceLine, LineItemDraft, LineItems, PaymentDraft,
    PaymentTransaction, ProductLine, ProductLineDraft, TableBooking, TableBookingDraft,
};
pub use notification::{
    NewNotification, Notification, NotificationChannel, NotificationStatus, NotificationType,
};
pub use reservation::{
    Audit, BookingSlot, Holder, Reservation, ReservationDetail, ReservationDraft,
};
pub use reservation_event::ReservationEvent;
pub use schedule::{DiningTable, ScheduleSlot, ShiftAvailability, TableSlotAvailability};
pub use status::{EventShift, ReservationStatus, ReservationType};
