//! Persistence layer: the store contract and its two backends.
//!
//! [`ReservationStore`] is the read side plus a factory for [`StoreTx`], the
//! unit of work every lifecycle operation runs in. A transaction is applied
//! only by [`StoreTx::commit`]; dropping it discards every staged write, so
//! an early `?` return rolls the reservation, its children and its
//! notification back together.
//!
//! * [`postgres::PgStore`] is the production backend (`sqlx::PgPool`).
//! * [`memory::MemoryStore`] keeps everything in process. It backs local
//!   runs with `PERSISTENCE_ENABLED=false` and the test suite.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::domain::{
    DiningTable, EventShift, LineItemDraft, LineItems, NewNotification, Notification,
    NotificationId, PaymentId, PaymentTransaction, Reservation, ReservationCode, ReservationId,
    ReservationStatus,
};
use crate::error::ReservationError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Status and gateway reference reported back by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    /// New gateway status.
    pub status: String,
    /// Gateway reference, if the gateway supplied one.
    pub external_transaction_id: Option<String>,
}

/// One unit of work against the store.
///
/// Writers call [`StoreTx::lock_dates`] before their availability checks so
/// that check, code allocation and insert are serialised per reservation
/// date.
pub trait StoreTx: Send + fmt::Debug {
    /// Serialises writers touching any of `dates` until commit or rollback.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn lock_dates(
        &mut self,
        dates: &[NaiveDate],
    ) -> impl Future<Output = Result<(), ReservationError>> + Send;

    /// Loads a reservation and locks its row for the rest of the unit.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn reservation_for_update(
        &mut self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>, ReservationError>> + Send;

    /// `true` if a live booking other than `exclude` holds the table.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn table_conflict(
        &mut self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;

    /// `true` if a live event reservation other than `exclude` holds the
    /// event type for the shift.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn event_conflict(
        &mut self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
        exclude: Option<ReservationId>,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;

    /// Every code issued with `date`'s prefix, cancelled or moved
    /// reservations included.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn codes_for_date(
        &mut self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ReservationCode>, ReservationError>> + Send;

    /// Inserts a reservation. The incoming `id` is ignored; the returned
    /// record carries the store-assigned one.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure and
    /// [`ReservationError::Internal`] on a code collision.
    fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<Reservation, ReservationError>> + Send;

    /// Overwrites the stored row with `reservation`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ReservationNotFound`] if the row is gone,
    /// [`ReservationError::Persistence`] on storage failure.
    fn update_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> impl Future<Output = Result<(), ReservationError>> + Send;

    /// Marks every active child of the reservation inactive. Returns how
    /// many rows were superseded.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn deactivate_line_items(
        &mut self,
        reservation_id: ReservationId,
        actor: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, ReservationError>> + Send;

    /// Inserts a fresh, active set of children.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn insert_line_items(
        &mut self,
        reservation_id: ReservationId,
        items: &LineItemDraft,
        actor: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LineItems, ReservationError>> + Send;

    /// Records a notification intent.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn insert_notification(
        &mut self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Notification, ReservationError>> + Send;

    /// Applies a gateway status report to an active payment transaction of
    /// the reservation. `None` if no such transaction exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn update_payment(
        &mut self,
        reservation_id: ReservationId,
        payment_id: PaymentId,
        update: &PaymentUpdate,
        actor: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<PaymentTransaction>, ReservationError>> + Send;

    /// Makes every staged write visible.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] if the commit fails; nothing
    /// is applied in that case.
    fn commit(self) -> impl Future<Output = Result<(), ReservationError>> + Send;
}

/// Storage backend for reservations and notifications.
///
/// Reads outside a unit of work see committed data only and take no locks.
pub trait ReservationStore: Clone + Send + Sync + fmt::Debug + 'static {
    /// Unit-of-work type.
    type Tx: StoreTx;

    /// Opens a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] if no connection is available.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, ReservationError>> + Send;

    /// Loads a reservation by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn find_reservation(
        &self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>, ReservationError>> + Send;

    /// Children of a reservation; superseded rows only when asked.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn line_items(
        &self,
        id: ReservationId,
        include_inactive: bool,
    ) -> impl Future<Output = Result<LineItems, ReservationError>> + Send;

    /// Reservations of a customer, newest date first.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn list_by_customer(
        &self,
        customer_id: i64,
    ) -> impl Future<Output = Result<Vec<Reservation>, ReservationError>> + Send;

    /// Reservations on a date, optionally filtered by status, in time order.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn list_by_date(
        &self,
        date: NaiveDate,
        status: Option<ReservationStatus>,
    ) -> impl Future<Output = Result<Vec<Reservation>, ReservationError>> + Send;

    /// `true` if a live booking holds the table at the exact slot.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn is_table_booked(
        &self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;

    /// `true` if a live event reservation holds the event type and shift.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn is_event_booked(
        &self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;

    /// Active dining tables, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn active_tables(
        &self,
    ) -> impl Future<Output = Result<Vec<DiningTable>, ReservationError>> + Send;

    /// `(table, time)` pairs held by live bookings on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn booked_table_slots(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<HashSet<(i64, NaiveTime)>, ReservationError>> + Send;

    /// Shifts held by live event reservations on `date`, optionally for one
    /// event type only.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn booked_event_shifts(
        &self,
        date: NaiveDate,
        event_type_id: Option<i64>,
    ) -> impl Future<Output = Result<HashSet<EventShift>, ReservationError>> + Send;

    /// Loads a notification by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn find_notification(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<Option<Notification>, ReservationError>> + Send;

    /// Notifications of a reservation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn notifications_for(
        &self,
        reservation_id: ReservationId,
    ) -> impl Future<Output = Result<Vec<Notification>, ReservationError>> + Send;

    /// Pending notifications due at `now`, earliest `next_attempt_at`
    /// first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn pending_notifications(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Notification>, ReservationError>> + Send;

    /// Counts a failed delivery of a pending notification. With `retry_at`
    /// it stays pending until then; without, it is parked as failed.
    /// `false` if it was not pending.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn record_delivery_failure(
        &self,
        id: NotificationId,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;

    /// Flips a pending notification to sent. `false` if it was not pending.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    fn mark_notification_sent(
        &self,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, ReservationError>> + Send;
}
