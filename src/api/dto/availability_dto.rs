//! Query parameters of the availability endpoints.
//!
//! Parameter names follow the booking front-end (`tableId`, `eventTypeId`).

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::EventShift;
use crate::error::ReservationError;

use super::reservation_dto::parse_time;

/// `GET /reservation/table-availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct TableAvailabilityQuery {
    /// Dining-table id.
    pub table_id: i64,
    /// Date to check.
    pub date: NaiveDate,
    /// `HH:MM` or `HH:MM:SS`.
    pub time: String,
}

impl TableAvailabilityQuery {
    /// Parsed time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidRequest`] for a malformed time.
    pub fn time(&self) -> Result<NaiveTime, ReservationError> {
        parse_time(&self.time)
    }
}

/// `GET /reservation/event-availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct EventAvailabilityQuery {
    /// Event type id.
    pub event_type_id: i64,
    /// Date to check.
    pub date: NaiveDate,
    /// `1|2|3`, `morning|afternoon|evening` or `mañana|tarde|noche`.
    pub shift: String,
}

impl EventAvailabilityQuery {
    /// Parsed shift.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidShift`] for an unknown shift.
    pub fn shift(&self) -> Result<EventShift, ReservationError> {
        self.shift.parse()
    }
}

/// `GET /reservation/availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// Day to report.
    pub date: NaiveDate,
}

/// `GET /reservation/event-shifts/availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct EventShiftQuery {
    /// Day to report.
    pub date: NaiveDate,
    /// Restrict occupancy to one event type.
    #[serde(default)]
    pub event_type_id: Option<i64>,
}
