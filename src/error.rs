//! Service error types with HTTP status code mapping.
//!
//! [`ReservationError`] is the central error type for the service. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EventShift, NotificationId, PaymentId, ReservationId, ReservationStatus};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "table 2 is not available on 2025-07-04 at 13:00:00",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the range table on [`ReservationError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                     |
/// |-----------|--------------------|---------------------------------|
/// | 1000–1999 | Validation         | 400 Bad Request                 |
/// | 2000–2099 | Not Found          | 404 Not Found                   |
/// | 2100–2299 | Availability/State | 409 Conflict                    |
/// | 2300–2399 | Record state       | 422 Unprocessable Entity        |
/// | 2400–2499 | Access             | 403 Forbidden                   |
/// | 3000–3999 | Server             | 500 Internal Server Error       |
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Event shift string could not be parsed.
    #[error("invalid event shift: {0:?}")]
    InvalidShift(String),

    /// Reservation status string could not be parsed.
    #[error("invalid reservation status: {0:?}")]
    InvalidStatus(String),

    /// Reservation with the given ID was not found.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Notification with the given ID was not found.
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// Payment transaction not found on the given reservation.
    #[error("payment {payment_id} not found on reservation {reservation_id}")]
    PaymentNotFound {
        /// Owning reservation.
        reservation_id: ReservationId,
        /// Missing payment transaction.
        payment_id: PaymentId,
    },

    /// The table is already booked for the requested slot.
    #[error("table {table_id} is not available on {date} at {time}")]
    TableUnavailable {
        /// Catalog table id.
        table_id: i64,
        /// Requested date.
        date: NaiveDate,
        /// Requested time slot.
        time: NaiveTime,
    },

    /// The event type is already booked for the requested shift.
    #[error("event type {event_type_id} is not available on {date} for the {shift} shift")]
    EventUnavailable {
        /// Catalog event type id.
        event_type_id: i64,
        /// Requested date.
        date: NaiveDate,
        /// Requested shift.
        shift: EventShift,
    },

    /// The reservation is already in the target status.
    #[error("reservation {id} is already {status}")]
    AlreadyInStatus {
        /// Reservation identifier.
        id: ReservationId,
        /// Current (and requested) status.
        status: ReservationStatus,
    },

    /// The requested transition is not allowed from the current status.
    #[error("cannot move reservation {id} from {from} to {to}")]
    IllegalTransition {
        /// Reservation identifier.
        id: ReservationId,
        /// Current status.
        from: ReservationStatus,
        /// Requested status.
        to: ReservationStatus,
    },

    /// The reservation record has been deactivated.
    #[error("reservation {0} is not active")]
    InactiveReservation(ReservationId),

    /// Caller lacks the capability required for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReservationError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidShift(_) => 1002,
            Self::InvalidStatus(_) => 1003,
            Self::ReservationNotFound(_) => 2001,
            Self::NotificationNotFound(_) => 2002,
            Self::PaymentNotFound { .. } => 2003,
            Self::TableUnavailable { .. } => 2101,
            Self::EventUnavailable { .. } => 2102,
            Self::AlreadyInStatus { .. } => 2201,
            Self::IllegalTransition { .. } => 2202,
            Self::InactiveReservation(_) => 2301,
            Self::Forbidden(_) => 2401,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidShift(_) | Self::InvalidStatus(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ReservationNotFound(_)
            | Self::NotificationNotFound(_)
            | Self::PaymentNotFound { .. } => StatusCode::NOT_FOUND,
            Self::TableUnavailable { .. }
            | Self::EventUnavailable { .. }
            | Self::AlreadyInStatus { .. }
            | Self::IllegalTransition { .. } => StatusCode::CONFLICT,
            Self::InactiveReservation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for the availability conflicts (table or event slot).
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::TableUnavailable { .. } | Self::EventUnavailable { .. }
        )
    }
}

/// Name of the unique constraint guarding reservation codes.
pub(crate) const CODE_UNIQUE_CONSTRAINT: &str = "reservations_code_key";

impl From<sqlx::Error> for ReservationError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() && db.constraint() == Some(CODE_UNIQUE_CONSTRAINT) {
                tracing::error!(error = %db, "reservation code collision");
                return Self::Internal("reservation code collision".to_string());
            }
        }
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Server-side failures keep their detail in the logs only.
        let message = match &self {
            Self::Persistence(detail) | Self::Internal(detail) => {
                tracing::error!(code = self.error_code(), %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        let err = ReservationError::AlreadyInStatus {
            id: ReservationId::new(7),
            status: ReservationStatus::Cancelled,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 2201);
        assert_eq!(err.to_string(), "reservation 7 is already CANCELLED");
    }

    #[test]
    fn internal_errors_hide_detail() {
        let response =
            ReservationError::Persistence("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unavailable_classification() {
        let err = ReservationError::EventUnavailable {
            event_type_id: 3,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
            shift: EventShift::Evening,
        };
        assert!(err.is_unavailable());
        assert!(!ReservationError::InvalidRequest("x".to_string()).is_unavailable());
    }
}
