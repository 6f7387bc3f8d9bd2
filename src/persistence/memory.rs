//! In-process store with the same contract as the PostgreSQL backend.
//!
//! All state sits behind one [`tokio::sync::Mutex`]. A [`MemoryTx`] holds
//! the lock for its whole lifetime and works on a staged copy, so units of
//! work are fully serialised and a dropped transaction leaves no trace.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{PaymentUpdate, ReservationStore, StoreTx};
use crate::domain::{
    Audit, DiningTable, EventServiceLine, EventShift, LineItemDraft, LineItemId, LineItems,
    NewNotification, Notification, NotificationId, NotificationStatus, PaymentId,
    PaymentTransaction, ProductLine, Reservation, ReservationCode, ReservationId,
    ReservationStatus, ReservationType, TableBooking,
};
use crate::error::ReservationError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    reservations: BTreeMap<ReservationId, Reservation>,
    tables: Vec<TableBooking>,
    products: Vec<ProductLine>,
    events: Vec<EventServiceLine>,
    payments: Vec<PaymentTransaction>,
    notifications: BTreeMap<NotificationId, Notification>,
    dining_tables: BTreeMap<i64, DiningTable>,
}

/// Active and not cancelled: the only reservations that hold a slot.
fn is_live(reservation: &Reservation) -> bool {
    reservation.active && reservation.status != ReservationStatus::Cancelled
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn table_conflict(
        &self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> bool {
        self.tables
            .iter()
            .filter(|b| b.active && b.table_id == table_id && Some(b.reservation_id) != exclude)
            .filter_map(|b| self.reservations.get(&b.reservation_id))
            .any(|r| is_live(r) && r.reservation_date == date && r.reservation_time == Some(time))
    }

    fn event_conflict(
        &self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
        exclude: Option<ReservationId>,
    ) -> bool {
        self.reservations.values().any(|r| {
            is_live(r)
                && Some(r.id) != exclude
                && r.reservation_type == ReservationType::Event
                && r.event_type_id == Some(event_type_id)
                && r.reservation_date == date
                && r.event_shift == Some(shift)
        })
    }

    fn line_items(&self, id: ReservationId, include_inactive: bool) -> LineItems {
        let keep = |owner: ReservationId, active: bool| owner == id && (include_inactive || active);
        LineItems {
            tables: self
                .tables
                .iter()
                .filter(|t| keep(t.reservation_id, t.active))
                .cloned()
                .collect(),
            products: self
                .products
                .iter()
                .filter(|p| keep(p.reservation_id, p.active))
                .cloned()
                .collect(),
            events: self
                .events
                .iter()
                .filter(|e| keep(e.reservation_id, e.active))
                .cloned()
                .collect(),
            payments: self
                .payments
                .iter()
                .filter(|p| keep(p.reservation_id, p.active))
                .cloned()
                .collect(),
        }
    }
}

/// In-memory [`ReservationStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store with no dining tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose table catalog holds `tables`.
    #[must_use]
    pub fn with_tables(tables: impl IntoIterator<Item = DiningTable>) -> Self {
        let state = MemoryState {
            dining_tables: tables.into_iter().map(|t| (t.id, t)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Adds or replaces dining tables in the catalog.
    pub async fn seed_tables(&self, tables: impl IntoIterator<Item = DiningTable>) {
        let mut state = self.state.lock().await;
        for table in tables {
            state.dining_tables.insert(table.id, table);
        }
    }
}

/// Unit of work over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl StoreTx for MemoryTx {
    async fn lock_dates(&mut self, _dates: &[NaiveDate]) -> Result<(), ReservationError> {
        // The store-wide guard already serialises every writer.
        Ok(())
    }

    async fn reservation_for_update(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, ReservationError> {
        Ok(self.staged.reservations.get(&id).cloned())
    }

    async fn table_conflict(
        &mut self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> Result<bool, ReservationError> {
        Ok(self.staged.table_conflict(table_id, date, time, exclude))
    }

    async fn event_conflict(
        &mut self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
        exclude: Option<ReservationId>,
    ) -> Result<bool, ReservationError> {
        Ok(self.staged.event_conflict(event_type_id, date, shift, exclude))
    }

    async fn codes_for_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<Vec<ReservationCode>, ReservationError> {
        Ok(self
            .staged
            .reservations
            .values()
            .filter(|r| r.code.correlative_for(date).is_some())
            .map(|r| r.code.clone())
            .collect())
    }

    async fn insert_reservation(
        &mut self,
        mut reservation: Reservation,
    ) -> Result<Reservation, ReservationError> {
        if self
            .staged
            .reservations
            .values()
            .any(|r| r.code == reservation.code)
        {
            return Err(ReservationError::Internal(
                "reservation code collision".to_string(),
            ));
        }
        reservation.id = ReservationId::new(self.staged.next_id());
        self.staged
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), ReservationError> {
        let Some(slot) = self.staged.reservations.get_mut(&reservation.id) else {
            return Err(ReservationError::ReservationNotFound(reservation.id));
        };
        slot.clone_from(reservation);
        Ok(())
    }

    async fn deactivate_line_items(
        &mut self,
        reservation_id: ReservationId,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, ReservationError> {
        let mut superseded = 0_u64;
        let mut retire = |owner: ReservationId, active: &mut bool, audit: &mut Audit| {
            if owner == reservation_id && *active {
                *active = false;
                audit.touch(actor, now);
                superseded += 1;
            }
        };
        let state = &mut self.staged;
        for t in &mut state.tables {
            retire(t.reservation_id, &mut t.active, &mut t.audit);
        }
        for p in &mut state.products {
            retire(p.reservation_id, &mut p.active, &mut p.audit);
        }
        for e in &mut state.events {
            retire(e.reservation_id, &mut e.active, &mut e.audit);
        }
        for p in &mut state.payments {
            retire(p.reservation_id, &mut p.active, &mut p.audit);
        }
        Ok(superseded)
    }

    async fn insert_line_items(
        &mut self,
        reservation_id: ReservationId,
        items: &LineItemDraft,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<LineItems, ReservationError> {
        let state = &mut self.staged;
        let mut inserted = LineItems::default();
        for t in &items.tables {
            inserted.tables.push(TableBooking {
                id: LineItemId::new(state.next_id()),
                reservation_id,
                table_id: t.table_id,
                observation: t.observation.clone(),
                audit: Audit::created(actor, now),
                active: true,
            });
        }
        for p in &items.products {
            inserted.products.push(ProductLine {
                id: LineItemId::new(state.next_id()),
                reservation_id,
                product_id: p.product_id,
                quantity: p.quantity,
                subtotal: p.subtotal,
                observation: p.observation.clone(),
                audit: Audit::created(actor, now),
                active: true,
            });
        }
        for e in &items.events {
            inserted.events.push(EventServiceLine {
                id: LineItemId::new(state.next_id()),
                reservation_id,
                service_id: e.service_id,
                quantity: e.quantity,
                subtotal: e.subtotal,
                observation: e.observation.clone(),
                audit: Audit::created(actor, now),
                active: true,
            });
        }
        for pay in &items.payments {
            inserted.payments.push(PaymentTransaction {
                id: PaymentId::new(state.next_id()),
                reservation_id,
                payment_date: pay.payment_date,
                payment_method: pay.payment_method.clone(),
                amount: pay.amount,
                status: pay.status.clone(),
                external_transaction_id: pay.external_transaction_id.clone(),
                audit: Audit::created(pay.created_by.unwrap_or(actor), now),
                active: true,
            });
        }
        state.tables.extend(inserted.tables.iter().cloned());
        state.products.extend(inserted.products.iter().cloned());
        state.events.extend(inserted.events.iter().cloned());
        state.payments.extend(inserted.payments.iter().cloned());
        Ok(inserted)
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Notification, ReservationError> {
        let id = NotificationId::new(self.staged.next_id());
        let record = notification.into_record(id, now);
        self.staged.notifications.insert(id, record.clone());
        Ok(record)
    }

    async fn update_payment(
        &mut self,
        reservation_id: ReservationId,
        payment_id: PaymentId,
        update: &PaymentUpdate,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>, ReservationError> {
        let payment = self
            .staged
            .payments
            .iter_mut()
            .find(|p| p.active && p.id == payment_id && p.reservation_id == reservation_id);
        Ok(payment.map(|p| {
            p.status.clone_from(&update.status);
            if let Some(external) = &update.external_transaction_id {
                p.external_transaction_id = Some(external.clone());
            }
            p.audit.touch(actor, now);
            p.clone()
        }))
    }

    async fn commit(self) -> Result<(), ReservationError> {
        let Self { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}

impl ReservationStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, ReservationError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, ReservationError> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn line_items(
        &self,
        id: ReservationId,
        include_inactive: bool,
    ) -> Result<LineItems, ReservationError> {
        Ok(self.state.lock().await.line_items(id, include_inactive))
    }

    async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<Reservation>, ReservationError> {
        let state = self.state.lock().await;
        let mut found: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.active && r.customer_id == customer_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.reservation_date
                .cmp(&a.reservation_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(found)
    }

    async fn list_by_date(
        &self,
        date: NaiveDate,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let state = self.state.lock().await;
        let mut found: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.active && r.reservation_date == date)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.reservation_time, r.id));
        Ok(found)
    }

    async fn is_table_booked(
        &self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ReservationError> {
        Ok(self
            .state
            .lock()
            .await
            .table_conflict(table_id, date, time, None))
    }

    async fn is_event_booked(
        &self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
    ) -> Result<bool, ReservationError> {
        Ok(self
            .state
            .lock()
            .await
            .event_conflict(event_type_id, date, shift, None))
    }

    async fn active_tables(&self) -> Result<Vec<DiningTable>, ReservationError> {
        Ok(self
            .state
            .lock()
            .await
            .dining_tables
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }

    async fn booked_table_slots(
        &self,
        date: NaiveDate,
    ) -> Result<HashSet<(i64, NaiveTime)>, ReservationError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .iter()
            .filter(|b| b.active)
            .filter_map(|b| {
                let r = state.reservations.get(&b.reservation_id)?;
                if !is_live(r) || r.reservation_date != date {
                    return None;
                }
                Some((b.table_id, r.reservation_time?))
            })
            .collect())
    }

    async fn booked_event_shifts(
        &self,
        date: NaiveDate,
        event_type_id: Option<i64>,
    ) -> Result<HashSet<EventShift>, ReservationError> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| {
                is_live(r)
                    && r.reservation_type == ReservationType::Event
                    && r.reservation_date == date
                    && event_type_id.is_none_or(|e| r.event_type_id == Some(e))
            })
            .filter_map(|r| r.event_shift)
            .collect())
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, ReservationError> {
        Ok(self.state.lock().await.notifications.get(&id).cloned())
    }

    async fn notifications_for(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<Notification>, ReservationError> {
        Ok(self
            .state
            .lock()
            .await
            .notifications
            .values()
            .filter(|n| n.active && n.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn pending_notifications(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, ReservationError> {
        let state = self.state.lock().await;
        let mut due: Vec<&Notification> = state
            .notifications
            .values()
            .filter(|n| {
                n.active && n.status == NotificationStatus::Pending && n.next_attempt_at <= now
            })
            .collect();
        due.sort_by_key(|n| (n.next_attempt_at, n.id));
        Ok(due.into_iter().take(limit).cloned().collect())
    }

    async fn mark_notification_sent(
        &self,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<bool, ReservationError> {
        let mut state = self.state.lock().await;
        let Some(n) = state.notifications.get_mut(&id) else {
            return Ok(false);
        };
        if n.status != NotificationStatus::Pending {
            return Ok(false);
        }
        n.status = NotificationStatus::Sent;
        n.sent_at = Some(at);
        n.audit.updated_at = Some(at);
        Ok(true)
    }

    async fn record_delivery_failure(
        &self,
        id: NotificationId,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, ReservationError> {
        let mut state = self.state.lock().await;
        let Some(n) = state.notifications.get_mut(&id) else {
            return Ok(false);
        };
        if n.status != NotificationStatus::Pending {
            return Ok(false);
        }
        n.attempts += 1;
        match retry_at {
            Some(at) => n.next_attempt_at = at,
            None => n.status = NotificationStatus::Failed,
        }
        n.audit.updated_at = Some(now);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ReservationDraft;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default()
    }

    fn seven_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default()
    }

    async fn book_table(store: &MemoryStore, table_id: i64) -> Reservation {
        let draft = ReservationDraft::for_tables(10, date(), seven_pm(), &[table_id]);
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let codes = tx.codes_for_date(date()).await.unwrap_or_default();
        let code = ReservationCode::next_after(date(), &codes);
        let pending = Reservation::from_draft(ReservationId::new(0), code, &draft, 1, Utc::now());
        let Ok(reservation) = tx.insert_reservation(pending).await else {
            panic!("insert failed");
        };
        let Ok(_) = tx
            .insert_line_items(reservation.id, &draft.line_items, 1, Utc::now())
            .await
        else {
            panic!("line items failed");
        };
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };
        reservation
    }

    #[tokio::test]
    async fn dropped_tx_rolls_back() {
        let store = MemoryStore::new();
        {
            let Ok(mut tx) = store.begin().await else {
                panic!("begin failed");
            };
            let draft = ReservationDraft::for_event(1, date(), 2, EventShift::Morning);
            let pending = Reservation::from_draft(
                ReservationId::new(0),
                ReservationCode::new(date(), 1),
                &draft,
                1,
                Utc::now(),
            );
            let Ok(_) = tx.insert_reservation(pending).await else {
                panic!("insert failed");
            };
        }
        let listed = store.list_by_date(date(), None).await.unwrap_or_default();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn committed_booking_blocks_table() {
        let store = MemoryStore::new();
        let reservation = book_table(&store, 5).await;
        assert_eq!(reservation.code.as_str(), "RES-20250601-001");

        let booked = store.is_table_booked(5, date(), seven_pm()).await;
        assert!(matches!(booked, Ok(true)));
        let other = store.is_table_booked(6, date(), seven_pm()).await;
        assert!(matches!(other, Ok(false)));

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let own = tx
            .table_conflict(5, date(), seven_pm(), Some(reservation.id))
            .await;
        assert!(matches!(own, Ok(false)));
    }

    #[tokio::test]
    async fn cancelled_booking_frees_table() {
        let store = MemoryStore::new();
        let mut reservation = book_table(&store, 5).await;
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        reservation.status = ReservationStatus::Cancelled;
        let Ok(()) = tx.update_reservation(&reservation).await else {
            panic!("update failed");
        };
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };
        let booked = store.is_table_booked(5, date(), seven_pm()).await;
        assert!(matches!(booked, Ok(false)));
        let slots = store.booked_table_slots(date()).await.unwrap_or_default();
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn deactivated_children_stay_for_audit() {
        let store = MemoryStore::new();
        let reservation = book_table(&store, 3).await;
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let superseded = tx
            .deactivate_line_items(reservation.id, 2, Utc::now())
            .await;
        assert!(matches!(superseded, Ok(1)));
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };

        let active = store.line_items(reservation.id, false).await.unwrap_or_default();
        assert!(active.tables.is_empty());
        let all = store.line_items(reservation.id, true).await.unwrap_or_default();
        assert_eq!(all.tables.len(), 1);
        assert!(all.tables.iter().all(|t| !t.active && t.audit.updated_by == Some(2)));
    }

    #[tokio::test]
    async fn seeded_tables_are_listed() {
        let store = MemoryStore::new();
        store
            .seed_tables([
                DiningTable {
                    id: 2,
                    code: "M-02".to_string(),
                    capacity: 4,
                    location: None,
                    active: true,
                },
                DiningTable {
                    id: 1,
                    code: "M-01".to_string(),
                    capacity: 2,
                    location: None,
                    active: false,
                },
            ])
            .await;
        let tables = store.active_tables().await.unwrap_or_default();
        assert_eq!(tables.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
    }
}
