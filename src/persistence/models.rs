//! Row types for the PostgreSQL tables and their conversion into domain
//! records.
//!
//! Enumerations are stored as text (and the event shift as its numeric
//! code), so loading a row can fail if the column holds a value the domain
//! no longer knows. That surfaces as [`ReservationError::Persistence`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Audit, DiningTable, EventServiceLine, EventShift, Holder, LineItemId, Notification,
    NotificationId, PaymentId, PaymentTransaction, ProductLine, Reservation, ReservationCode,
    ReservationId, TableBooking,
};
use crate::error::ReservationError;

/// Audit columns present on every table except the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditColumns {
    /// Creator.
    pub created_by: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modifier.
    pub updated_by: Option<i64>,
    /// Last modification timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AuditColumns> for Audit {
    fn from(row: AuditColumns) -> Self {
        Self {
            created_by: row.created_by,
            created_at: row.created_at,
            updated_by: row.updated_by,
            updated_at: row.updated_at,
        }
    }
}

/// A row of `reservations`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRow {
    /// Primary key.
    pub id: ReservationId,
    /// Unique code.
    pub code: String,
    /// Customer reference.
    pub customer_id: i64,
    /// Booked date.
    pub reservation_date: NaiveDate,
    /// Booked time.
    pub reservation_time: Option<NaiveTime>,
    /// Party size.
    pub people_count: i32,
    /// Status text.
    pub status: String,
    /// Payment method label.
    pub payment_method: String,
    /// `TABLE` or `EVENT`.
    pub reservation_type: String,
    /// Event type reference.
    pub event_type_id: Option<i64>,
    /// Shift code 1..=3.
    pub event_shift: Option<i16>,
    /// Table layout code.
    pub table_distribution_type: Option<i32>,
    /// Tablecloth colour code.
    pub tablecloth_color: Option<i32>,
    /// Holder document.
    pub holder_document: Option<String>,
    /// Holder phone.
    pub holder_phone: Option<String>,
    /// Holder name.
    pub holder_name: Option<String>,
    /// Holder email.
    pub holder_email: Option<String>,
    /// Free-text note.
    pub observation: Option<String>,
    /// Terms accepted.
    pub terms_accepted: bool,
    /// Staff member.
    pub employee_id: Option<i64>,
    /// Cancellation timestamp.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

fn corrupt(what: &str, err: &ReservationError) -> ReservationError {
    ReservationError::Persistence(format!("stored {what} is invalid: {err}"))
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = ReservationError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e| corrupt("status", &e))?;
        let reservation_type = row
            .reservation_type
            .parse()
            .map_err(|e| corrupt("reservation type", &e))?;
        let event_shift = row
            .event_shift
            .map(|code| {
                EventShift::from_code(i64::from(code)).ok_or_else(|| {
                    ReservationError::Persistence(format!("stored event shift {code} is invalid"))
                })
            })
            .transpose()?;
        Ok(Self {
            id: row.id,
            code: ReservationCode::from_stored(row.code),
            customer_id: row.customer_id,
            reservation_date: row.reservation_date,
            reservation_time: row.reservation_time,
            people_count: row.people_count,
            status,
            payment_method: row.payment_method,
            reservation_type,
            event_type_id: row.event_type_id,
            event_shift,
            table_distribution_type: row.table_distribution_type,
            tablecloth_color: row.tablecloth_color,
            holder: Holder {
                holder_document: row.holder_document,
                holder_phone: row.holder_phone,
                holder_name: row.holder_name,
                holder_email: row.holder_email,
            },
            observation: row.observation,
            terms_accepted: row.terms_accepted,
            employee_id: row.employee_id,
            cancelled_at: row.cancelled_at,
            audit: row.audit.into(),
            active: row.active,
        })
    }
}

/// A row of `reservation_tables`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TableBookingRow {
    /// Primary key.
    pub id: LineItemId,
    /// Owner.
    pub reservation_id: ReservationId,
    /// Catalog table.
    pub table_id: i64,
    /// Note.
    pub observation: Option<String>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

impl From<TableBookingRow> for TableBooking {
    fn from(row: TableBookingRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            table_id: row.table_id,
            observation: row.observation,
            audit: row.audit.into(),
            active: row.active,
        }
    }
}

/// A row of `reservation_products`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductLineRow {
    /// Primary key.
    pub id: LineItemId,
    /// Owner.
    pub reservation_id: ReservationId,
    /// Catalog product.
    pub product_id: i64,
    /// Units.
    pub quantity: i32,
    /// Subtotal.
    pub subtotal: Decimal,
    /// Note.
    pub observation: Option<String>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

impl From<ProductLineRow> for ProductLine {
    fn from(row: ProductLineRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            product_id: row.product_id,
            quantity: row.quantity,
            subtotal: row.subtotal,
            observation: row.observation,
            audit: row.audit.into(),
            active: row.active,
        }
    }
}

/// A row of `reservation_events`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventServiceRow {
    /// Primary key.
    pub id: LineItemId,
    /// Owner.
    pub reservation_id: ReservationId,
    /// Catalog service.
    pub service_id: i64,
    /// Units.
    pub quantity: i32,
    /// Subtotal.
    pub subtotal: Decimal,
    /// Note.
    pub observation: Option<String>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

impl From<EventServiceRow> for EventServiceLine {
    fn from(row: EventServiceRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            service_id: row.service_id,
            quantity: row.quantity,
            subtotal: row.subtotal,
            observation: row.observation,
            audit: row.audit.into(),
            active: row.active,
        }
    }
}

/// A row of `payment_transactions`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    /// Primary key.
    pub id: PaymentId,
    /// Owner.
    pub reservation_id: ReservationId,
    /// Payment timestamp.
    pub payment_date: DateTime<Utc>,
    /// Method label.
    pub payment_method: String,
    /// Amount.
    pub amount: Decimal,
    /// Gateway status.
    pub status: String,
    /// Gateway reference.
    pub external_transaction_id: Option<String>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

impl From<PaymentRow> for PaymentTransaction {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            payment_date: row.payment_date,
            payment_method: row.payment_method,
            amount: row.amount,
            status: row.status,
            external_transaction_id: row.external_transaction_id,
            audit: row.audit.into(),
            active: row.active,
        }
    }
}

/// A row of `notifications`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    /// Primary key.
    pub id: NotificationId,
    /// Owner.
    pub reservation_id: ReservationId,
    /// Type text.
    pub notification_type: String,
    /// Channel text.
    pub channel: String,
    /// Message.
    pub message: String,
    /// Delivery state text.
    pub status: String,
    /// Delivery timestamp.
    pub sent_at: Option<DateTime<Utc>>,
    /// Failed attempts.
    pub attempts: i32,
    /// Next pickup.
    pub next_attempt_at: DateTime<Utc>,
    /// Audit columns.
    #[sqlx(flatten)]
    pub audit: AuditColumns,
    /// Soft-delete flag.
    pub active: bool,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = ReservationError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            reservation_id: row.reservation_id,
            notification_type: row
                .notification_type
                .parse()
                .map_err(|e| corrupt("notification type", &e))?,
            channel: row.channel.parse().map_err(|e| corrupt("channel", &e))?,
            message: row.message,
            status: row
                .status
                .parse()
                .map_err(|e| corrupt("notification status", &e))?,
            sent_at: row.sent_at,
            attempts: row.attempts,
            next_attempt_at: row.next_attempt_at,
            audit: row.audit.into(),
            active: row.active,
        })
    }
}

/// A row of `dining_tables`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiningTableRow {
    /// Catalog id.
    pub id: i64,
    /// Display code.
    pub code: String,
    /// Seats.
    pub capacity: i32,
    /// Area.
    pub location: Option<String>,
    /// Catalog flag.
    pub active: bool,
}

impl From<DiningTableRow> for DiningTable {
    fn from(row: DiningTableRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            capacity: row.capacity,
            location: row.location,
            active: row.active,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ReservationStatus, ReservationType};

    fn row() -> ReservationRow {
        ReservationRow {
            id: ReservationId::new(4),
            code: "RES-20250601-004".to_string(),
            customer_id: 10,
            reservation_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
            reservation_time: None,
            people_count: 30,
            status: "CANCELADO".to_string(),
            payment_method: "CARD".to_string(),
            reservation_type: "EVENTO".to_string(),
            event_type_id: Some(2),
            event_shift: Some(3),
            table_distribution_type: None,
            tablecloth_color: None,
            holder_document: None,
            holder_phone: None,
            holder_name: Some("Ana".to_string()),
            holder_email: None,
            observation: None,
            terms_accepted: true,
            employee_id: None,
            cancelled_at: None,
            audit: AuditColumns {
                created_by: 1,
                created_at: Utc::now(),
                updated_by: None,
                updated_at: None,
            },
            active: true,
        }
    }

    #[test]
    fn legacy_labels_load() {
        let Ok(reservation) = Reservation::try_from(row()) else {
            panic!("row should convert");
        };
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
        assert_eq!(reservation.reservation_type, ReservationType::Event);
        assert_eq!(reservation.event_shift, Some(EventShift::Evening));
        assert_eq!(reservation.holder.holder_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn unknown_shift_code_is_a_persistence_error() {
        let mut bad = row();
        bad.event_shift = Some(9);
        assert!(matches!(
            Reservation::try_from(bad),
            Err(ReservationError::Persistence(_))
        ));
    }
}
