//! DTOs for the reservation endpoints.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    BookingSlot, EventServiceDraft, EventServiceLine, EventShift, Holder, LineItemDraft,
    LineItems, PaymentDraft, PaymentTransaction, ProductLine, ProductLineDraft, Reservation,
    ReservationDetail, ReservationDraft, ReservationStatus, ReservationType, TableBooking,
    TableBookingDraft,
};
use crate::error::ReservationError;
use crate::persistence::PaymentUpdate;

/// Event shift as sent by clients: the numeric code or a label.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ShiftInput {
    /// `1`, `2` or `3`.
    Code(i64),
    /// `morning`, `tarde`, `"3"`...
    Label(String),
}

impl TryFrom<ShiftInput> for EventShift {
    type Error = ReservationError;

    fn try_from(input: ShiftInput) -> Result<Self, Self::Error> {
        match input {
            ShiftInput::Code(code) => Self::from_code(code)
                .ok_or_else(|| ReservationError::InvalidShift(code.to_string())),
            ShiftInput::Label(label) => label.parse(),
        }
    }
}

/// A table requested by the booking.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TableLineRequest {
    /// Dining-table id.
    pub table_id: i64,
    /// Free-text note.
    #[serde(default)]
    pub observation: Option<String>,
}

/// A pre-ordered product.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductLineRequest {
    /// Catalogue product id.
    pub product_id: i64,
    /// Units ordered.
    pub quantity: i32,
    /// Line subtotal.
    #[schema(value_type = String, example = "24.50")]
    pub subtotal: Decimal,
    /// Free-text note.
    #[serde(default)]
    pub observation: Option<String>,
}

/// An event service (decoration, music, ...).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EventServiceRequest {
    /// Catalogue service id.
    pub service_id: i64,
    /// Units ordered.
    pub quantity: i32,
    /// Line subtotal.
    #[schema(value_type = String, example = "150.00")]
    pub subtotal: Decimal,
    /// Free-text note.
    #[serde(default)]
    pub observation: Option<String>,
}

/// A payment made for the booking.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// When the payment happened; defaults to now.
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    /// Method label (`CARD`, `CASH`, ...).
    pub payment_method: String,
    /// Amount paid.
    #[schema(value_type = String, example = "80.00")]
    pub amount: Decimal,
    /// Gateway status label.
    pub status: String,
    /// Gateway transaction reference.
    #[serde(default)]
    pub external_transaction_id: Option<String>,
    /// Audit user for this payment row.
    #[serde(default)]
    pub created_by: Option<i64>,
}

/// Request body for `POST /reservation` and `PUT /reservation/{id}`.
///
/// An update replaces every field and the whole line-item set.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReservationRequest {
    /// Customer reference.
    pub customer_id: i64,
    /// Date to book.
    pub reservation_date: NaiveDate,
    /// `HH:MM` or `HH:MM:SS`; required for table bookings.
    #[serde(default)]
    pub reservation_time: Option<String>,
    /// Party size; defaults to 1.
    #[serde(default = "default_people")]
    pub people_count: i32,
    /// Payment method label.
    pub payment_method: String,
    /// `TABLE` or `EVENT` (legacy `MESA`/`EVENTO` accepted).
    pub reservation_type: ReservationType,
    /// Required for event bookings.
    #[serde(default)]
    pub event_type_id: Option<i64>,
    /// Required for event bookings.
    #[serde(default)]
    pub event_shift: Option<ShiftInput>,
    /// Table layout code.
    #[serde(default)]
    pub table_distribution_type: Option<i32>,
    /// Tablecloth colour code.
    #[serde(default)]
    pub tablecloth_color: Option<i32>,
    /// Holder identity.
    #[serde(flatten)]
    pub holder: Holder,
    /// Free-text note.
    #[serde(default)]
    pub observation: Option<String>,
    /// Terms and conditions accepted.
    #[serde(default)]
    pub terms_accepted: bool,
    /// Staff member handling the booking.
    #[serde(default)]
    pub employee_id: Option<i64>,
    /// Tables to book.
    #[serde(default)]
    pub tables: Vec<TableLineRequest>,
    /// Pre-ordered products.
    #[serde(default)]
    pub products: Vec<ProductLineRequest>,
    /// Event services.
    #[serde(default)]
    pub events: Vec<EventServiceRequest>,
    /// Payments.
    #[serde(default)]
    pub payments: Vec<PaymentRequest>,
}

fn default_people() -> i32 {
    1
}

/// Parses `HH:MM:SS` or `HH:MM`.
///
/// # Errors
///
/// Returns [`ReservationError::InvalidRequest`] for anything else.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ReservationError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ReservationError::InvalidRequest(format!("invalid time: {raw}")))
}

impl TryFrom<ReservationRequest> for ReservationDraft {
    type Error = ReservationError;

    fn try_from(req: ReservationRequest) -> Result<Self, Self::Error> {
        let time = req.reservation_time.as_deref().map(parse_time).transpose()?;
        let slot = match req.reservation_type {
            ReservationType::Table => BookingSlot::Table {
                time: time.ok_or_else(|| {
                    ReservationError::InvalidRequest(
                        "reservation_time is required for a table reservation".to_string(),
                    )
                })?,
            },
            ReservationType::Event => BookingSlot::Event {
                event_type_id: req.event_type_id.ok_or_else(|| {
                    ReservationError::InvalidRequest(
                        "event_type_id is required for an event reservation".to_string(),
                    )
                })?,
                shift: req
                    .event_shift
                    .ok_or_else(|| ReservationError::InvalidShift("missing".to_string()))?
                    .try_into()?,
                time,
            },
        };

        let line_items = LineItemDraft {
            tables: req
                .tables
                .into_iter()
                .map(|t| TableBookingDraft {
                    table_id: t.table_id,
                    observation: t.observation,
                })
                .collect(),
            products: req
                .products
                .into_iter()
                .map(|p| ProductLineDraft {
                    product_id: p.product_id,
                    quantity: p.quantity,
                    subtotal: p.subtotal,
                    observation: p.observation,
                })
                .collect(),
            events: req
                .events
                .into_iter()
                .map(|e| EventServiceDraft {
                    service_id: e.service_id,
                    quantity: e.quantity,
                    subtotal: e.subtotal,
                    observation: e.observation,
                })
                .collect(),
            payments: req
                .payments
                .into_iter()
                .map(|p| PaymentDraft {
                    payment_date: p.payment_date.unwrap_or_else(Utc::now),
                    payment_method: p.payment_method,
                    amount: p.amount,
                    status: p.status,
                    external_transaction_id: p.external_transaction_id,
                    created_by: p.created_by,
                })
                .collect(),
        };

        Ok(Self {
            customer_id: req.customer_id,
            reservation_date: req.reservation_date,
            slot,
            people_count: req.people_count,
            payment_method: req.payment_method,
            table_distribution_type: req.table_distribution_type,
            tablecloth_color: req.tablecloth_color,
            holder: req.holder,
            observation: req.observation,
            terms_accepted: req.terms_accepted,
            employee_id: req.employee_id,
            line_items,
        })
    }
}

/// A reservation with its line items.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationResponse {
    /// Header fields.
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Booked tables.
    pub tables: Vec<TableBooking>,
    /// Pre-ordered products.
    pub products: Vec<ProductLine>,
    /// Event services.
    pub events: Vec<EventServiceLine>,
    /// Payments.
    pub payments: Vec<PaymentTransaction>,
}

impl From<ReservationDetail> for ReservationResponse {
    fn from(detail: ReservationDetail) -> Self {
        let LineItems {
            tables,
            products,
            events,
            payments,
        } = detail.line_items;
        Self {
            reservation: detail.reservation,
            tables,
            products,
            events,
            payments,
        }
    }
}

/// Query for `GET /reservation/{id}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DetailQuery {
    /// Include superseded line items.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Body of `PATCH /reservation/{id}/status`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    /// Target status (`PENDING`, `CHECK_IN`, `CHECK_OUT`, `PAID`, `CANCELLED`).
    pub status: String,
}

impl StatusChangeRequest {
    /// Parses the target status.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidStatus`] for an unknown label.
    pub fn target(&self) -> Result<ReservationStatus, ReservationError> {
        self.status.parse()
    }
}

/// Parses the `{status}` path segment of the date listing. `ALL` means no
/// filter.
///
/// # Errors
///
/// Returns [`ReservationError::InvalidStatus`] for an unknown label.
pub fn status_filter(raw: &str) -> Result<Option<ReservationStatus>, ReservationError> {
    if raw.trim().eq_ignore_ascii_case("ALL") {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

/// Body of `PATCH /reservation/{id}/payments/{payment_id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentStatusRequest {
    /// New gateway status label.
    pub status: String,
    /// Gateway transaction reference, if one was issued.
    #[serde(default)]
    pub external_transaction_id: Option<String>,
}

impl From<PaymentStatusRequest> for PaymentUpdate {
    fn from(req: PaymentStatusRequest) -> Self {
        Self {
            status: req.status,
            external_transaction_id: req.external_transaction_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn request(json: &str) -> ReservationRequest {
        let Ok(req) = serde_json::from_str(json) else {
            panic!("request should deserialize: {json}");
        };
        req
    }

    #[test]
    fn table_request_converts() {
        let req = request(
            r#"{
                "customer_id": 10,
                "reservation_date": "2025-07-04",
                "reservation_time": "13:00",
                "payment_method": "CASH",
                "reservation_type": "MESA",
                "holder_name": "Ana",
                "tables": [{"table_id": 2}],
                "products": [{"product_id": 7, "quantity": 2, "subtotal": "24.50"}]
            }"#,
        );
        let Ok(draft) = ReservationDraft::try_from(req) else {
            panic!("conversion failed");
        };
        assert_eq!(
            draft.slot,
            BookingSlot::Table {
                time: NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default()
            }
        );
        assert_eq!(draft.people_count, 1);
        assert_eq!(draft.holder.holder_name.as_deref(), Some("Ana"));
        assert_eq!(draft.line_items.table_ids(), vec![2]);
        assert_eq!(
            draft.line_items.products.first().map(|p| p.subtotal),
            Some(Decimal::new(2450, 2))
        );
    }

    #[test]
    fn event_shift_accepts_code_and_label() {
        for shift in ["2", "\"tarde\"", "\"afternoon\""] {
            let req = request(&format!(
                r#"{{"customer_id": 1, "reservation_date": "2025-08-15",
                    "payment_method": "CARD", "reservation_type": "EVENT",
                    "event_type_id": 3, "event_shift": {shift}}}"#
            ));
            let Ok(draft) = ReservationDraft::try_from(req) else {
                panic!("conversion failed for {shift}");
            };
            assert_eq!(draft.slot.shift(), Some(EventShift::Afternoon));
        }
    }

    #[test]
    fn garbled_shift_is_invalid_shift() {
        let req = request(
            r#"{"customer_id": 1, "reservation_date": "2025-08-15",
                "payment_method": "CARD", "reservation_type": "EVENT",
                "event_type_id": 3, "event_shift": "brunch"}"#,
        );
        assert!(matches!(
            ReservationDraft::try_from(req),
            Err(ReservationError::InvalidShift(_))
        ));
    }

    #[test]
    fn table_request_without_time_is_rejected() {
        let req = request(
            r#"{"customer_id": 1, "reservation_date": "2025-08-15",
                "payment_method": "CARD", "reservation_type": "TABLE",
                "tables": [{"table_id": 1}]}"#,
        );
        assert!(matches!(
            ReservationDraft::try_from(req),
            Err(ReservationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn time_formats() {
        assert!(parse_time("19:00:00").is_ok());
        assert!(parse_time("19:00").is_ok());
        assert!(parse_time("7pm").is_err());
    }

    #[test]
    fn status_filter_all_means_none() {
        assert!(matches!(status_filter("all"), Ok(None)));
        assert!(matches!(
            status_filter("PENDING"),
            Ok(Some(ReservationStatus::Pending))
        ));
        assert!(status_filter("LOST").is_err());
    }
}
