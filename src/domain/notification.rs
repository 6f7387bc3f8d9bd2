//! Notification intents recorded alongside every lifecycle transition.
//!
//! Recording is part of the transition's transaction. Delivery happens
//! later, out of band, see [`crate::service::dispatcher`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::reservation::Audit;
use super::{NotificationId, ReservationCode, ReservationId, ReservationStatus};
use crate::error::ReservationError;

/// Lifecycle event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Reservation created.
    Creation,
    /// Reservation details changed.
    Update,
    /// Reservation cancelled.
    Cancellation,
    /// Guests checked in.
    CheckIn,
    /// Guests checked out.
    CheckOut,
    /// Reservation paid.
    Paid,
}

impl NotificationType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "CREATION",
            Self::Update => "UPDATE",
            Self::Cancellation => "CANCELLATION",
            Self::CheckIn => "CHECK_IN",
            Self::CheckOut => "CHECK_OUT",
            Self::Paid => "PAID",
        }
    }

    /// Notification emitted when a reservation lands in `status`.
    #[must_use]
    pub const fn for_status(status: ReservationStatus) -> Self {
        match status {
            ReservationStatus::Pending => Self::Update,
            ReservationStatus::CheckIn => Self::CheckIn,
            ReservationStatus::CheckOut => Self::CheckOut,
            ReservationStatus::Paid => Self::Paid,
            ReservationStatus::Cancelled => Self::Cancellation,
        }
    }

    /// Customer-facing message for a reservation with `code`.
    #[must_use]
    pub fn message(self, code: &ReservationCode) -> String {
        let lead = match self {
            Self::Creation => "Your reservation has been created successfully.",
            Self::Update => "Your reservation has been updated.",
            Self::Cancellation => "Your reservation has been cancelled.",
            Self::CheckIn => "Welcome! Your reservation is checked in.",
            Self::CheckOut => "Thank you for visiting. Your reservation is checked out.",
            Self::Paid => "We have received your payment.",
        };
        format!("{lead} Reservation code: {code}")
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    /// E-mail to the holder address.
    #[default]
    Email,
    /// WhatsApp message to the holder phone.
    Whatsapp,
    /// SMS to the holder phone.
    Sms,
}

impl NotificationChannel {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Whatsapp => "WHATSAPP",
            Self::Sms => "SMS",
        }
    }
}

/// Delivery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Waiting for the delivery collaborator.
    #[default]
    #[serde(alias = "PENDIENTE")]
    Pending,
    /// Delivered.
    #[serde(alias = "ENVIADO")]
    Sent,
    /// Gave up after the retry budget ran out.
    Failed,
}

impl NotificationStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ReservationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($variant),)+
                    _ => Err(ReservationError::InvalidRequest(format!(
                        concat!("unknown ", stringify!($ty), ": {}"),
                        s
                    ))),
                }
            }
        }
    };
}

display_and_parse!(NotificationType,
    "CREATION" => Self::Creation,
    "UPDATE" => Self::Update,
    "CANCELLATION" => Self::Cancellation,
    "CHECK_IN" => Self::CheckIn,
    "CHECK_OUT" => Self::CheckOut,
    "PAID" => Self::Paid,
);

display_and_parse!(NotificationChannel,
    "EMAIL" => Self::Email,
    "WHATSAPP" => Self::Whatsapp,
    "SMS" => Self::Sms,
);

display_and_parse!(NotificationStatus,
    "PENDING" => Self::Pending,
    "PENDIENTE" => Self::Pending,
    "SENT" => Self::Sent,
    "ENVIADO" => Self::Sent,
    "FAILED" => Self::Failed,
);

/// Recorded notification intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// Notification id.
    pub id: NotificationId,
    /// Reservation the notification is about.
    pub reservation_id: ReservationId,
    /// Lifecycle event.
    pub notification_type: NotificationType,
    /// Delivery channel.
    pub channel: NotificationChannel,
    /// Message text.
    pub message: String,
    /// Delivery state.
    pub status: NotificationStatus,
    /// Set when delivered.
    pub sent_at: Option<DateTime<Utc>>,
    /// Failed delivery attempts so far.
    pub attempts: i32,
    /// Earliest time the outbox picks it up again.
    pub next_attempt_at: DateTime<Utc>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// Soft-delete flag.
    pub active: bool,
}

/// Notification to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    /// Reservation the notification is about.
    pub reservation_id: ReservationId,
    /// Lifecycle event.
    pub notification_type: NotificationType,
    /// Delivery channel.
    pub channel: NotificationChannel,
    /// Message text.
    pub message: String,
    /// Initial delivery state, normally [`NotificationStatus::Pending`].
    pub status: NotificationStatus,
    /// Pre-set delivery timestamp (only for already-sent records).
    pub sent_at: Option<DateTime<Utc>>,
    /// Recorder.
    pub created_by: i64,
}

impl NewNotification {
    /// Pending e-mail notification for a lifecycle event on `code`.
    #[must_use]
    pub fn lifecycle(
        reservation_id: ReservationId,
        code: &ReservationCode,
        notification_type: NotificationType,
        created_by: i64,
    ) -> Self {
        Self {
            reservation_id,
            notification_type,
            channel: NotificationChannel::Email,
            message: notification_type.message(code),
            status: NotificationStatus::Pending,
            sent_at: None,
            created_by,
        }
    }

    /// Materialises the record once the store has assigned an id.
    #[must_use]
    pub fn into_record(self, id: NotificationId, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            reservation_id: self.reservation_id,
            notification_type: self.notification_type,
            channel: self.channel,
            message: self.message,
            status: self.status,
            sent_at: self.sent_at,
            attempts: 0,
            next_attempt_at: now,
            audit: Audit::created(self.created_by, now),
            active: true,
        }
    }
}
