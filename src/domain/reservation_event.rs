//! Domain events emitted after a reservation mutation commits.
//!
//! Every committed write publishes a [`ReservationEvent`] through the
//! [`super::EventBus`]. The notification dispatcher is the main subscriber:
//! it uses the events as a wake-up signal for the outbox.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{NotificationId, NotificationType, ReservationCode, ReservationId, ReservationStatus};

/// Domain event emitted after every committed reservation mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ReservationEvent {
    /// A reservation was created.
    Created {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// Assigned code.
        code: ReservationCode,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A reservation's details and children were replaced.
    Updated {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A reservation moved between lifecycle states.
    StatusChanged {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// Status before the write.
        from: ReservationStatus,
        /// Status after the write.
        to: ReservationStatus,
        /// `true` when written through the administrative override.
        overridden: bool,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A notification intent was recorded and waits for delivery.
    NotificationRecorded {
        /// Reservation the notification is about.
        reservation_id: ReservationId,
        /// Notification identifier.
        notification_id: NotificationId,
        /// Lifecycle event reported.
        notification_type: NotificationType,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A payment transaction's gateway status was reconciled.
    PaymentReconciled {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// New gateway status.
        status: String,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ReservationEvent {
    /// Returns the reservation ID associated with this event.
    #[must_use]
    pub fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Created { reservation_id, .. }
            | Self::Updated { reservation_id, .. }
            | Self::StatusChanged { reservation_id, .. }
            | Self::NotificationRecorded { reservation_id, .. }
            | Self::PaymentReconciled { reservation_id, .. } => *reservation_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::StatusChanged { .. } => "status_changed",
            Self::NotificationRecorded { .. } => "notification_recorded",
            Self::PaymentReconciled { .. } => "payment_reconciled",
        }
    }

    /// Returns `true` when the event implies new pending notifications.
    #[must_use]
    pub const fn carries_notification(&self) -> bool {
        !matches!(self, Self::PaymentReconciled { .. })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_changed_serializes_with_tag() {
        let event = ReservationEvent::StatusChanged {
            reservation_id: ReservationId::new(9),
            from: ReservationStatus::Pending,
            to: ReservationStatus::Cancelled,
            overridden: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event);
        let Ok(json) = json else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"event_type\":\"status_changed\""));
        assert!(json.contains("\"to\":\"CANCELLED\""));
    }

    #[test]
    fn reservation_id_accessor() {
        let event = ReservationEvent::Updated {
            reservation_id: ReservationId::new(3),
            timestamp: Utc::now(),
        };
        assert_eq!(event.reservation_id(), ReservationId::new(3));
        assert_eq!(event.event_type_str(), "updated");
        assert!(event.carries_notification());
    }
}
