//! PostgreSQL implementation of the store.
//!
//! Writers serialise per reservation date with `pg_advisory_xact_lock`,
//! so the availability check, code allocation and insert of two concurrent
//! requests for the same day never interleave. Transitions additionally
//! lock the reservation row with `SELECT ... FOR UPDATE`. Both locks are
//! released by commit or rollback.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use super::models::{
    DiningTableRow, EventServiceRow, NotificationRow, PaymentRow, ProductLineRow, ReservationRow,
    TableBookingRow,
};
use super::{PaymentUpdate, ReservationStore, StoreTx};
use crate::config::ServiceConfig;
use crate::domain::{
    DiningTable, EventShift, LineItemDraft, LineItems, NewNotification, Notification,
    NotificationId, NotificationStatus, PaymentId, PaymentTransaction, Reservation,
    ReservationCode, ReservationId, ReservationStatus, ReservationType,
};
use crate::error::ReservationError;

/// First key of the two-key advisory lock space; the second is the date.
const DATE_LOCK_NAMESPACE: i32 = 0x5245_5356;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] if the database is
    /// unreachable within the connect timeout.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, ReservationError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ReservationError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ReservationError::Persistence(e.to_string()))
    }
}

/// Unit of work backed by a PostgreSQL transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTx").finish_non_exhaustive()
    }
}

async fn fetch_reservation<'e, E: PgExecutor<'e>>(
    executor: E,
    id: ReservationId,
    for_update: bool,
) -> Result<Option<Reservation>, ReservationError> {
    let sql = if for_update {
        "SELECT * FROM reservations WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM reservations WHERE id = $1"
    };
    sqlx::query_as::<_, ReservationRow>(sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Reservation::try_from)
        .transpose()
}

async fn table_booked<'e, E: PgExecutor<'e>>(
    executor: E,
    table_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<ReservationId>,
) -> Result<bool, ReservationError> {
    let booked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
            SELECT 1 FROM reservation_tables rt \
            JOIN reservations r ON r.id = rt.reservation_id \
            WHERE rt.table_id = $1 AND rt.active \
              AND r.active AND r.status <> 'CANCELLED' \
              AND r.reservation_date = $2 AND r.reservation_time = $3 \
              AND ($4::BIGINT IS NULL OR r.id <> $4))",
    )
    .bind(table_id)
    .bind(date)
    .bind(time)
    .bind(exclude)
    .fetch_one(executor)
    .await?;
    Ok(booked)
}

async fn event_booked<'e, E: PgExecutor<'e>>(
    executor: E,
    event_type_id: i64,
    date: NaiveDate,
    shift: EventShift,
    exclude: Option<ReservationId>,
) -> Result<bool, ReservationError> {
    let booked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
            SELECT 1 FROM reservations \
            WHERE reservation_type = 'EVENT' AND event_type_id = $1 \
              AND reservation_date = $2 AND event_shift = $3 \
              AND active AND status <> 'CANCELLED' \
              AND ($4::BIGINT IS NULL OR id <> $4))",
    )
    .bind(event_type_id)
    .bind(date)
    .bind(shift.code())
    .bind(exclude)
    .fetch_one(executor)
    .await?;
    Ok(booked)
}

impl StoreTx for PgTx {
    async fn lock_dates(&mut self, dates: &[NaiveDate]) -> Result<(), ReservationError> {
        // Fixed order so two writers spanning the same days cannot deadlock.
        let mut keys: Vec<i32> = dates.iter().map(Datelike::num_days_from_ce).collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
                .bind(DATE_LOCK_NAMESPACE)
                .bind(key)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn reservation_for_update(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, ReservationError> {
        fetch_reservation(&mut *self.tx, id, true).await
    }

    async fn table_conflict(
        &mut self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<ReservationId>,
    ) -> Result<bool, ReservationError> {
        table_booked(&mut *self.tx, table_id, date, time, exclude).await
    }

    async fn event_conflict(
        &mut self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
        exclude: Option<ReservationId>,
    ) -> Result<bool, ReservationError> {
        event_booked(&mut *self.tx, event_type_id, date, shift, exclude).await
    }

    async fn codes_for_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<Vec<ReservationCode>, ReservationError> {
        let pattern = format!("{}%", ReservationCode::day_prefix(date));
        let codes = sqlx::query_scalar::<_, String>("SELECT code FROM reservations WHERE code LIKE $1")
            .bind(pattern)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(codes.into_iter().map(ReservationCode::from_stored).collect())
    }

    async fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> Result<Reservation, ReservationError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            "INSERT INTO reservations ( \
                code, customer_id, reservation_date, reservation_time, people_count, status, \
                payment_method, reservation_type, event_type_id, event_shift, \
                table_distribution_type, tablecloth_color, holder_document, holder_phone, \
                holder_name, holder_email, observation, terms_accepted, employee_id, \
                cancelled_at, created_by, created_at, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21, $22, $23) \
             RETURNING *",
        )
        .bind(reservation.code.as_str())
        .bind(reservation.customer_id)
        .bind(reservation.reservation_date)
        .bind(reservation.reservation_time)
        .bind(reservation.people_count)
        .bind(reservation.status.as_str())
        .bind(&reservation.payment_method)
        .bind(reservation.reservation_type.as_str())
        .bind(reservation.event_type_id)
        .bind(reservation.event_shift.map(EventShift::code))
        .bind(reservation.table_distribution_type)
        .bind(reservation.tablecloth_color)
        .bind(&reservation.holder.holder_document)
        .bind(&reservation.holder.holder_phone)
        .bind(&reservation.holder.holder_name)
        .bind(&reservation.holder.holder_email)
        .bind(&reservation.observation)
        .bind(reservation.terms_accepted)
        .bind(reservation.employee_id)
        .bind(reservation.cancelled_at)
        .bind(reservation.audit.created_by)
        .bind(reservation.audit.created_at)
        .bind(reservation.active)
        .fetch_one(&mut *self.tx)
        .await?;
        Reservation::try_from(row)
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), ReservationError> {
        let result = sqlx::query(
            "UPDATE reservations SET \
                customer_id = $2, reservation_date = $3, reservation_time = $4, \
                people_count = $5, status = $6, payment_method = $7, reservation_type = $8, \
                event_type_id = $9, event_shift = $10, table_distribution_type = $11, \
                tablecloth_color = $12, holder_document = $13, holder_phone = $14, \
                holder_name = $15, holder_email = $16, observation = $17, \
                terms_accepted = $18, employee_id = $19, cancelled_at = $20, \
                updated_by = $21, updated_at = $22, active = $23 \
             WHERE id = $1",
        )
        .bind(reservation.id)
        .bind(reservation.customer_id)
        .bind(reservation.reservation_date)
        .bind(reservation.reservation_time)
        .bind(reservation.people_count)
        .bind(reservation.status.as_str())
        .bind(&reservation.payment_method)
        .bind(reservation.reservation_type.as_str())
        .bind(reservation.event_type_id)
        .bind(reservation.event_shift.map(EventShift::code))
        .bind(reservation.table_distribution_type)
        .bind(reservation.tablecloth_color)
        .bind(&reservation.holder.holder_document)
        .bind(&reservation.holder.holder_phone)
        .bind(&reservation.holder.holder_name)
        .bind(&reservation.holder.holder_email)
        .bind(&reservation.observation)
        .bind(reservation.terms_accepted)
        .bind(reservation.employee_id)
        .bind(reservation.cancelled_at)
        .bind(reservation.audit.updated_by)
        .bind(reservation.audit.updated_at)
        .bind(reservation.active)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ReservationError::ReservationNotFound(reservation.id));
        }
        Ok(())
    }

    async fn deactivate_line_items(
        &mut self,
        reservation_id: ReservationId,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, ReservationError> {
        let mut superseded = 0;
        for table in [
            "reservation_tables",
            "reservation_products",
            "reservation_events",
            "payment_transactions",
        ] {
            let sql = format!(
                "UPDATE {table} SET active = FALSE, updated_by = $2, updated_at = $3 \
                 WHERE reservation_id = $1 AND active"
            );
            let result = sqlx::query(&sql)
                .bind(reservation_id)
                .bind(actor)
                .bind(now)
                .execute(&mut *self.tx)
                .await?;
            superseded += result.rows_affected();
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
        let mut inserted = LineItems::default();
        for t in &items.tables {
            let row = sqlx::query_as::<_, TableBookingRow>(
                "INSERT INTO reservation_tables \
                    (reservation_id, table_id, observation, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING *",
            )
            .bind(reservation_id)
            .bind(t.table_id)
            .bind(&t.observation)
            .bind(actor)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
            inserted.tables.push(row.into());
        }
        for p in &items.products {
            let row = sqlx::query_as::<_, ProductLineRow>(
                "INSERT INTO reservation_products \
                    (reservation_id, product_id, quantity, subtotal, observation, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            )
            .bind(reservation_id)
            .bind(p.product_id)
            .bind(p.quantity)
            .bind(p.subtotal)
            .bind(&p.observation)
            .bind(actor)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
            inserted.products.push(row.into());
        }
        for e in &items.events {
            let row = sqlx::query_as::<_, EventServiceRow>(
                "INSERT INTO reservation_events \
                    (reservation_id, service_id, quantity, subtotal, observation, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            )
            .bind(reservation_id)
            .bind(e.service_id)
            .bind(e.quantity)
            .bind(e.subtotal)
            .bind(&e.observation)
            .bind(actor)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
            inserted.events.push(row.into());
        }
        for pay in &items.payments {
            let row = sqlx::query_as::<_, PaymentRow>(
                "INSERT INTO payment_transactions \
                    (reservation_id, payment_date, payment_method, amount, status, \
                     external_transaction_id, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
            )
            .bind(reservation_id)
            .bind(pay.payment_date)
            .bind(&pay.payment_method)
            .bind(pay.amount)
            .bind(&pay.status)
            .bind(&pay.external_transaction_id)
            .bind(pay.created_by.unwrap_or(actor))
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;
            inserted.payments.push(row.into());
        }
        Ok(inserted)
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Notification, ReservationError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "INSERT INTO notifications \
                (reservation_id, notification_type, channel, message, status, sent_at, \
                 next_attempt_at, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $8, $7, $8) RETURNING *",
        )
        .bind(notification.reservation_id)
        .bind(notification.notification_type.as_str())
        .bind(notification.channel.as_str())
        .bind(&notification.message)
        .bind(notification.status.as_str())
        .bind(notification.sent_at)
        .bind(notification.created_by)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Notification::try_from(row)
    }

    async fn update_payment(
        &mut self,
        reservation_id: ReservationId,
        payment_id: PaymentId,
        update: &PaymentUpdate,
        actor: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransaction>, ReservationError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "UPDATE payment_transactions SET status = $3, \
                external_transaction_id = COALESCE($4, external_transaction_id), \
                updated_by = $5, updated_at = $6 \
             WHERE id = $1 AND reservation_id = $2 AND active \
             RETURNING *",
        )
        .bind(payment_id)
        .bind(reservation_id)
        .bind(&update.status)
        .bind(&update.external_transaction_id)
        .bind(actor)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(PaymentTransaction::from))
    }

    async fn commit(self) -> Result<(), ReservationError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl ReservationStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, ReservationError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, ReservationError> {
        fetch_reservation(&self.pool, id, false).await
    }

    async fn line_items(
        &self,
        id: ReservationId,
        include_inactive: bool,
    ) -> Result<LineItems, ReservationError> {
        let tables = sqlx::query_as::<_, TableBookingRow>(
            "SELECT * FROM reservation_tables WHERE reservation_id = $1 AND ($2 OR active) ORDER BY id",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        let products = sqlx::query_as::<_, ProductLineRow>(
            "SELECT * FROM reservation_products WHERE reservation_id = $1 AND ($2 OR active) ORDER BY id",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        let events = sqlx::query_as::<_, EventServiceRow>(
            "SELECT * FROM reservation_events WHERE reservation_id = $1 AND ($2 OR active) ORDER BY id",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        let payments = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payment_transactions WHERE reservation_id = $1 AND ($2 OR active) ORDER BY id",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(LineItems {
            tables: tables.into_iter().map(Into::into).collect(),
            products: products.into_iter().map(Into::into).collect(),
            events: events.into_iter().map(Into::into).collect(),
            payments: payments.into_iter().map(Into::into).collect(),
        })
    }

    async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<Reservation>, ReservationError> {
        sqlx::query_as::<_, ReservationRow>(
            "SELECT * FROM reservations WHERE customer_id = $1 AND active \
             ORDER BY reservation_date DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    async fn list_by_date(
        &self,
        date: NaiveDate,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, ReservationError> {
        sqlx::query_as::<_, ReservationRow>(
            "SELECT * FROM reservations \
             WHERE reservation_date = $1 AND active AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY reservation_time NULLS FIRST, id",
        )
        .bind(date)
        .bind(status.map(ReservationStatus::as_str))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    async fn is_table_booked(
        &self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ReservationError> {
        table_booked(&self.pool, table_id, date, time, None).await
    }

    async fn is_event_booked(
        &self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
    ) -> Result<bool, ReservationError> {
        event_booked(&self.pool, event_type_id, date, shift, None).await
    }

    async fn active_tables(&self) -> Result<Vec<DiningTable>, ReservationError> {
        let rows = sqlx::query_as::<_, DiningTableRow>(
            "SELECT id, code, capacity, location, active FROM dining_tables WHERE active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn booked_table_slots(
        &self,
        date: NaiveDate,
    ) -> Result<HashSet<(i64, NaiveTime)>, ReservationError> {
        let rows = sqlx::query_as::<_, (i64, NaiveTime)>(
            "SELECT rt.table_id, r.reservation_time \
             FROM reservation_tables rt \
             JOIN reservations r ON r.id = rt.reservation_id \
             WHERE r.reservation_date = $1 AND r.reservation_time IS NOT NULL \
               AND rt.active AND r.active AND r.status <> 'CANCELLED'",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn booked_event_shifts(
        &self,
        date: NaiveDate,
        event_type_id: Option<i64>,
    ) -> Result<HashSet<EventShift>, ReservationError> {
        let codes = sqlx::query_scalar::<_, i16>(
            "SELECT DISTINCT event_shift FROM reservations \
             WHERE reservation_type = $1 AND reservation_date = $2 \
               AND event_shift IS NOT NULL AND active AND status <> 'CANCELLED' \
               AND ($3::BIGINT IS NULL OR event_type_id = $3)",
        )
        .bind(ReservationType::Event.as_str())
        .bind(date)
        .bind(event_type_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes
            .into_iter()
            .filter_map(|code| EventShift::from_code(i64::from(code)))
            .collect())
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, ReservationError> {
        sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Notification::try_from)
            .transpose()
    }

    async fn notifications_for(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<Notification>, ReservationError> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE reservation_id = $1 AND active \
             ORDER BY created_at, id",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn pending_notifications(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, ReservationError> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications \
             WHERE status = $1 AND active AND next_attempt_at <= $3 \
             ORDER BY next_attempt_at, id LIMIT $2",
        )
        .bind(NotificationStatus::Pending.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn mark_notification_sent(
        &self,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> Result<bool, ReservationError> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, sent_at = $3, updated_at = $3 \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(NotificationStatus::Sent.as_str())
        .bind(at)
        .bind(NotificationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_delivery_failure(
        &self,
        id: NotificationId,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, ReservationError> {
        let result = sqlx::query(
            "UPDATE notifications SET attempts = attempts + 1, \
                 status = CASE WHEN $2::timestamptz IS NULL THEN $3 ELSE status END, \
                 next_attempt_at = COALESCE($2, next_attempt_at), updated_at = $4 \
             WHERE id = $1 AND status = $5",
        )
        .bind(id)
        .bind(retry_at)
        .bind(NotificationStatus::Failed.as_str())
        .bind(now)
        .bind(NotificationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
