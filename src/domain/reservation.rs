//! The reservation aggregate root and the validated draft it is built from.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::line_items::{LineItemDraft, LineItems};
use super::{EventShift, ReservationCode, ReservationId, ReservationStatus, ReservationType};
use crate::error::ReservationError;

/// Audit columns shared by every persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Audit {
    /// User that created the record.
    pub created_by: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// User that last modified the record.
    pub updated_by: Option<i64>,
    /// Last modification timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// Audit block for a record created now by `actor`.
    #[must_use]
    pub fn created(actor: i64, at: DateTime<Utc>) -> Self {
        Self {
            created_by: actor,
            created_at: at,
            updated_by: None,
            updated_at: None,
        }
    }

    /// Stamps a modification.
    pub fn touch(&mut self, actor: i64, at: DateTime<Utc>) {
        self.updated_by = Some(actor);
        self.updated_at = Some(at);
    }
}

/// Holder identity copied from the customer at booking time, so the
/// reservation stays self-describing if customer data changes later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Holder {
    /// Identity document number.
    pub holder_document: Option<String>,
    /// Contact phone.
    pub holder_phone: Option<String>,
    /// Full name.
    pub holder_name: Option<String>,
    /// Contact email.
    pub holder_email: Option<String>,
}

/// What is being booked, with the fields that type requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingSlot {
    /// Tables at an exact time slot. Table ids live in the line items.
    Table {
        /// Slot start.
        time: NaiveTime,
    },
    /// An event type for a whole shift.
    Event {
        /// Catalog event type.
        event_type_id: i64,
        /// Booked shift.
        shift: EventShift,
        /// Optional arrival time inside the shift.
        time: Option<NaiveTime>,
    },
}

impl BookingSlot {
    /// Reservation type implied by the slot.
    #[must_use]
    pub const fn reservation_type(&self) -> ReservationType {
        match self {
            Self::Table { .. } => ReservationType::Table,
            Self::Event { .. } => ReservationType::Event,
        }
    }

    /// Time of day, if any.
    #[must_use]
    pub const fn time(&self) -> Option<NaiveTime> {
        match *self {
            Self::Table { time } => Some(time),
            Self::Event { time, .. } => time,
        }
    }

    /// Event type, for event bookings.
    #[must_use]
    pub const fn event_type_id(&self) -> Option<i64> {
        match *self {
            Self::Table { .. } => None,
            Self::Event { event_type_id, .. } => Some(event_type_id),
        }
    }

    /// Event shift, for event bookings.
    #[must_use]
    pub const fn shift(&self) -> Option<EventShift> {
        match *self {
            Self::Table { .. } => None,
            Self::Event { shift, .. } => Some(shift),
        }
    }
}

/// Persisted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    /// Store-assigned identifier.
    pub id: ReservationId,
    /// Unique human-readable code.
    pub code: ReservationCode,
    /// Customer reference.
    pub customer_id: i64,
    /// Booked date.
    pub reservation_date: NaiveDate,
    /// Booked time of day; absent for some event bookings.
    pub reservation_time: Option<NaiveTime>,
    /// Party size.
    pub people_count: i32,
    /// Lifecycle status.
    pub status: ReservationStatus,
    /// Payment method label chosen by the customer.
    pub payment_method: String,
    /// Table or event booking.
    pub reservation_type: ReservationType,
    /// Event type for event bookings.
    pub event_type_id: Option<i64>,
    /// Event shift for event bookings.
    pub event_shift: Option<EventShift>,
    /// Table layout code (event styling).
    pub table_distribution_type: Option<i32>,
    /// Tablecloth colour code (event styling).
    pub tablecloth_color: Option<i32>,
    /// Denormalised holder identity.
    #[serde(flatten)]
    pub holder: Holder,
    /// Free-text note.
    pub observation: Option<String>,
    /// Whether terms and conditions were accepted.
    pub terms_accepted: bool,
    /// Staff member handling the booking.
    pub employee_id: Option<i64>,
    /// Set only when the reservation is cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// Soft-delete flag.
    pub active: bool,
}

impl Reservation {
    /// Builds the unsaved record for a fresh reservation; the store assigns
    /// the id.
    #[must_use]
    pub fn from_draft(
        id: ReservationId,
        code: ReservationCode,
        draft: &ReservationDraft,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut reservation = Self {
            id,
            code,
            customer_id: draft.customer_id,
            reservation_date: draft.reservation_date,
            reservation_time: None,
            people_count: draft.people_count,
            status: ReservationStatus::Pending,
            payment_method: String::new(),
            reservation_type: draft.slot.reservation_type(),
            event_type_id: None,
            event_shift: None,
            table_distribution_type: None,
            tablecloth_color: None,
            holder: Holder::default(),
            observation: None,
            terms_accepted: false,
            employee_id: None,
            cancelled_at: None,
            audit: Audit::created(actor, now),
            active: true,
        };
        reservation.apply_draft(draft);
        reservation
    }

    /// Overwrites every client-editable field from `draft`. Code, status,
    /// audit and soft-delete flag are left alone.
    pub fn apply_draft(&mut self, draft: &ReservationDraft) {
        self.customer_id = draft.customer_id;
        self.reservation_date = draft.reservation_date;
        self.reservation_time = draft.slot.time();
        self.people_count = draft.people_count;
        self.payment_method.clone_from(&draft.payment_method);
        self.reservation_type = draft.slot.reservation_type();
        self.event_type_id = draft.slot.event_type_id();
        self.event_shift = draft.slot.shift();
        self.table_distribution_type = draft.table_distribution_type;
        self.tablecloth_color = draft.tablecloth_color;
        self.holder.clone_from(&draft.holder);
        self.observation.clone_from(&draft.observation);
        self.terms_accepted = draft.terms_accepted;
        self.employee_id = draft.employee_id;
    }
}

/// A reservation together with its child collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationDetail {
    /// The aggregate root.
    pub reservation: Reservation,
    /// Children; active only unless the caller asked for the audit view.
    pub line_items: LineItems,
}

/// Client input for create and full update, already parsed into domain
/// types. Call [`ReservationDraft::validate`] before any write.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDraft {
    /// Customer reference.
    pub customer_id: i64,
    /// Booked date.
    pub reservation_date: NaiveDate,
    /// Table slot or event slot.
    pub slot: BookingSlot,
    /// Party size.
    pub people_count: i32,
    /// Payment method label.
    pub payment_method: String,
    /// Table layout code.
    pub table_distribution_type: Option<i32>,
    /// Tablecloth colour code.
    pub tablecloth_color: Option<i32>,
    /// Holder identity.
    pub holder: Holder,
    /// Free-text note.
    pub observation: Option<String>,
    /// Terms accepted.
    pub terms_accepted: bool,
    /// Handling staff member.
    pub employee_id: Option<i64>,
    /// Child collections to persist.
    pub line_items: LineItemDraft,
}

impl ReservationDraft {
    /// Minimal draft booking `table_ids` at `date` + `time`.
    #[must_use]
    pub fn for_tables(
        customer_id: i64,
        reservation_date: NaiveDate,
        time: NaiveTime,
        table_ids: &[i64],
    ) -> Self {
        Self::new(
            customer_id,
            reservation_date,
            BookingSlot::Table { time },
            LineItemDraft::with_tables(table_ids),
        )
    }

    /// Minimal draft booking an event type for a shift.
    #[must_use]
    pub fn for_event(
        customer_id: i64,
        reservation_date: NaiveDate,
        event_type_id: i64,
        shift: EventShift,
    ) -> Self {
        Self::new(
            customer_id,
            reservation_date,
            BookingSlot::Event {
                event_type_id,
                shift,
                time: None,
            },
            LineItemDraft::default(),
        )
    }

    fn new(
        customer_id: i64,
        reservation_date: NaiveDate,
        slot: BookingSlot,
        line_items: LineItemDraft,
    ) -> Self {
        Self {
            customer_id,
            reservation_date,
            slot,
            people_count: 1,
            payment_method: "CASH".to_string(),
            table_distribution_type: None,
            tablecloth_color: None,
            holder: Holder::default(),
            observation: None,
            terms_accepted: true,
            employee_id: None,
            line_items,
        }
    }

    /// Rejects drafts that must never reach persistence.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidRequest`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ReservationError> {
        if self.customer_id <= 0 {
            return Err(invalid("customer_id must be positive"));
        }
        if self.people_count < 1 {
            return Err(invalid("people_count must be at least 1"));
        }
        if self.payment_method.trim().is_empty() {
            return Err(invalid("payment_method is required"));
        }
        if matches!(self.slot, BookingSlot::Table { .. }) && self.line_items.tables.is_empty() {
            return Err(invalid("a table reservation needs at least one table"));
        }
        if self.slot.time().is_none() && !self.line_items.tables.is_empty() {
            return Err(invalid("tables on an event reservation need an arrival time"));
        }
        self.line_items.validate()
    }
}

fn invalid(msg: &str) -> ReservationError {
    ReservationError::InvalidRequest(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 4).unwrap_or_default()
    }

    fn one_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default()
    }

    #[test]
    fn table_draft_requires_tables() {
        let draft = ReservationDraft::for_tables(10, date(), one_pm(), &[]);
        assert!(matches!(
            draft.validate(),
            Err(ReservationError::InvalidRequest(_))
        ));
        let draft = ReservationDraft::for_tables(10, date(), one_pm(), &[2]);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn event_draft_needs_no_tables() {
        let draft = ReservationDraft::for_event(10, date(), 4, EventShift::Afternoon);
        assert!(draft.validate().is_ok());
        assert_eq!(draft.slot.reservation_type(), ReservationType::Event);
        assert_eq!(draft.slot.time(), None);
    }

    #[test]
    fn event_tables_need_a_time() {
        let mut draft = ReservationDraft::for_event(10, date(), 4, EventShift::Afternoon);
        draft.line_items = LineItemDraft::with_tables(&[2]);
        assert!(matches!(
            draft.validate(),
            Err(ReservationError::InvalidRequest(_))
        ));
        draft.slot = BookingSlot::Event {
            event_type_id: 4,
            shift: EventShift::Afternoon,
            time: Some(one_pm()),
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn blank_payment_method_rejected() {
        let mut draft = ReservationDraft::for_tables(10, date(), one_pm(), &[2]);
        draft.payment_method = "  ".to_string();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn from_draft_starts_pending_and_active() {
        let draft = ReservationDraft::for_event(10, date(), 4, EventShift::Evening);
        let reservation = Reservation::from_draft(
            ReservationId::new(1),
            ReservationCode::new(date(), 1),
            &draft,
            99,
            Utc::now(),
        );
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert!(reservation.active);
        assert_eq!(reservation.event_shift, Some(EventShift::Evening));
        assert_eq!(reservation.event_type_id, Some(4));
        assert_eq!(reservation.audit.created_by, 99);
        assert!(reservation.cancelled_at.is_none());
    }
}
