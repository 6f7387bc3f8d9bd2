//! DTOs for the notification endpoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{
    NewNotification, NotificationChannel, NotificationStatus, NotificationType, ReservationId,
};

/// Body of `POST /notification`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NotificationRequest {
    /// Reservation the notification belongs to.
    pub reservation_id: ReservationId,
    /// Lifecycle event reported.
    pub notification_type: NotificationType,
    /// Delivery channel; defaults to `EMAIL`.
    #[serde(default)]
    pub channel: NotificationChannel,
    /// Message text.
    pub message: String,
    /// Delivery state; defaults to `PENDING`.
    #[serde(default)]
    pub status: NotificationStatus,
    /// Delivery time for notifications sent elsewhere.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    /// Builds the intent, attributed to `actor`.
    #[must_use]
    pub fn into_new(self, actor: i64) -> NewNotification {
        NewNotification {
            reservation_id: self.reservation_id,
            notification_type: self.notification_type,
            channel: self.channel,
            message: self.message,
            status: self.status,
            sent_at: self.sent_at,
            created_by: actor,
        }
    }
}
