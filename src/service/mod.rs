//! Service layer: business logic orchestration.
//!
//! [`ReservationService`] owns the lifecycle and every write. It runs each
//! mutation in one store unit of work and emits events through the
//! [`super::domain::EventBus`] after commit. [`AvailabilityService`] and
//! [`NotificationService`] serve the read side and manual notifications;
//! [`NotificationDispatcher`] drains the notification outbox.

pub mod availability;
pub mod dispatcher;
pub mod line_items;
pub mod notification_service;
pub mod reservation_service;

pub use availability::AvailabilityService;
pub use dispatcher::{
    DeliveryError, DispatchReport, LogSender, NotificationDispatcher, NotificationSender,
    RetryPolicy,
};
pub use notification_service::NotificationService;
pub use reservation_service::{AdminOverride, ReservationService};
