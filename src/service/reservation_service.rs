//! Reservation lifecycle: create, update, the status transitions and payment
//! reconciliation.
//!
//! Every write runs in one unit of work. The reservation row, its line items
//! and the lifecycle notification commit together or not at all, and bus
//! events are published only after commit.

use chrono::{DateTime, NaiveDate, Utc};
use constant_time_eq::constant_time_eq;

use crate::domain::{
    EventBus, NotificationType, PaymentId, PaymentTransaction, Reservation, ReservationCode,
    ReservationDetail, ReservationDraft, ReservationEvent, ReservationId, ReservationStatus,
};
use crate::error::ReservationError;
use crate::persistence::{PaymentUpdate, ReservationStore, StoreTx};

use super::availability::ensure_available;
use super::line_items::replace_children;
use super::notification_service::{publish_recorded, record_lifecycle};

/// Proof that the caller may force an arbitrary status.
///
/// Only obtainable through [`AdminOverride::authorize`], so the unguarded
/// status path cannot be reached by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminOverride(());

impl AdminOverride {
    /// Grants the override when `presented` matches the configured token.
    /// Surrounding whitespace is ignored on both sides and the comparison
    /// runs in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Forbidden`] when no token is configured,
    /// none was presented, or the two differ.
    pub fn authorize(
        configured: Option<&str>,
        presented: Option<&str>,
    ) -> Result<Self, ReservationError> {
        let Some(expected) = configured.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(ReservationError::Forbidden(
                "status override is disabled".to_string(),
            ));
        };
        match presented.map(str::trim) {
            Some(given) if constant_time_eq(expected.as_bytes(), given.as_bytes()) => {
                Ok(Self(()))
            }
            _ => Err(ReservationError::Forbidden(
                "invalid admin token".to_string(),
            )),
        }
    }
}

/// Orchestrates the reservation lifecycle over a [`ReservationStore`].
#[derive(Debug, Clone)]
pub struct ReservationService<S> {
    store: S,
    event_bus: EventBus,
}

impl<S: ReservationStore> ReservationService<S> {
    /// Creates a new `ReservationService`.
    #[must_use]
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Returns a reference to the event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Books a new reservation in status `PENDING`.
    ///
    /// The check-then-insert runs under the date lock: of two concurrent
    /// creates for the same slot exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidRequest`] for a malformed draft.
    /// - [`ReservationError::TableUnavailable`] /
    ///   [`ReservationError::EventUnavailable`] when a slot is taken.
    /// - [`ReservationError::Persistence`] on storage failure.
    pub async fn create(
        &self,
        draft: ReservationDraft,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        draft.validate()?;
        let now = Utc::now();
        let date = draft.reservation_date;

        let mut tx = self.store.begin().await?;
        tx.lock_dates(&[date]).await?;
        ensure_available(&mut tx, &draft, None).await?;

        let issued = tx.codes_for_date(date).await?;
        let code = ReservationCode::next_after(date, &issued);
        let reservation = tx
            .insert_reservation(Reservation::from_draft(
                ReservationId::new(0),
                code,
                &draft,
                actor,
                now,
            ))
            .await?;
        let line_items =
            replace_children(&mut tx, reservation.id, &draft.line_items, actor, now).await?;
        let notification =
            record_lifecycle(&mut tx, &reservation, NotificationType::Creation, actor, now)
                .await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %reservation.id,
            code = %reservation.code,
            reservation_type = %reservation.reservation_type,
            %date,
            total = %draft.line_items.total(),
            "reservation created"
        );
        let _ = self.event_bus.publish(ReservationEvent::Created {
            reservation_id: reservation.id,
            code: reservation.code.clone(),
            timestamp: now,
        });
        publish_recorded(&self.event_bus, &notification);

        Ok(ReservationDetail {
            reservation,
            line_items,
        })
    }

    /// Replaces the reservation's fields and its whole line-item set.
    ///
    /// Availability is re-checked for the new slot, ignoring the
    /// reservation's own bookings. Status and code never change here.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::ReservationNotFound`] if `id` does not exist.
    /// - [`ReservationError::InactiveReservation`] if it was soft-deleted.
    /// - the validation and availability errors of [`Self::create`].
    pub async fn update(
        &self,
        id: ReservationId,
        draft: ReservationDraft,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        draft.validate()?;
        let now = Utc::now();

        let mut tx = self.store.begin().await?;
        let mut reservation = load_for_update(&mut tx, id).await?;
        if !reservation.active {
            return Err(ReservationError::InactiveReservation(id));
        }
        tx.lock_dates(&[reservation.reservation_date, draft.reservation_date])
            .await?;
        ensure_available(&mut tx, &draft, Some(id)).await?;

        reservation.apply_draft(&draft);
        reservation.audit.touch(actor, now);
        tx.update_reservation(&reservation).await?;
        let line_items = replace_children(&mut tx, id, &draft.line_items, actor, now).await?;
        let notification =
            record_lifecycle(&mut tx, &reservation, NotificationType::Update, actor, now).await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %id,
            code = %reservation.code,
            date = %reservation.reservation_date,
            "reservation updated"
        );
        let _ = self.event_bus.publish(ReservationEvent::Updated {
            reservation_id: id,
            timestamp: now,
        });
        publish_recorded(&self.event_bus, &notification);

        Ok(ReservationDetail {
            reservation,
            line_items,
        })
    }

    /// Moves the reservation to `CANCELLED` and releases its slots.
    ///
    /// # Errors
    ///
    /// [`ReservationError::AlreadyInStatus`] if already cancelled,
    /// [`ReservationError::IllegalTransition`] from `PAID`, otherwise as
    /// [`Self::update`] for lookups.
    pub async fn cancel(
        &self,
        id: ReservationId,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        self.transition(id, ReservationStatus::Cancelled, actor)
            .await
    }

    /// `PENDING` to `CHECK_IN`.
    ///
    /// # Errors
    ///
    /// [`ReservationError::AlreadyInStatus`] or
    /// [`ReservationError::IllegalTransition`] when the current status does
    /// not allow it.
    pub async fn check_in(
        &self,
        id: ReservationId,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        self.transition(id, ReservationStatus::CheckIn, actor).await
    }

    /// `CHECK_IN` to `CHECK_OUT`.
    ///
    /// # Errors
    ///
    /// [`ReservationError::AlreadyInStatus`] or
    /// [`ReservationError::IllegalTransition`] when the current status does
    /// not allow it.
    pub async fn check_out(
        &self,
        id: ReservationId,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        self.transition(id, ReservationStatus::CheckOut, actor)
            .await
    }

    /// Marks the reservation `PAID`. Repeating it on a paid reservation
    /// succeeds and records another notification.
    ///
    /// # Errors
    ///
    /// [`ReservationError::IllegalTransition`] for a cancelled reservation.
    pub async fn mark_paid(
        &self,
        id: ReservationId,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        self.transition(id, ReservationStatus::Paid, actor).await
    }

    /// Forces `target` with no transition guard. Requires an
    /// [`AdminOverride`].
    ///
    /// # Errors
    ///
    /// [`ReservationError::ReservationNotFound`] if `id` does not exist,
    /// [`ReservationError::Persistence`] on storage failure.
    pub async fn override_status(
        &self,
        id: ReservationId,
        target: ReservationStatus,
        _grant: AdminOverride,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        tracing::warn!(reservation_id = %id, %target, actor, "administrative status override");
        self.write_status(id, target, actor, true).await
    }

    /// Loads a reservation with its line items. Inactive children are
    /// included only on request.
    ///
    /// # Errors
    ///
    /// [`ReservationError::ReservationNotFound`] if `id` does not exist.
    pub async fn get(
        &self,
        id: ReservationId,
        include_inactive: bool,
    ) -> Result<ReservationDetail, ReservationError> {
        let reservation = self
            .store
            .find_reservation(id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(id))?;
        let line_items = self.store.line_items(id, include_inactive).await?;
        Ok(ReservationDetail {
            reservation,
            line_items,
        })
    }

    /// All reservations of a customer, most recent date first.
    ///
    /// # Errors
    ///
    /// [`ReservationError::Persistence`] on storage failure.
    pub async fn list_by_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<ReservationDetail>, ReservationError> {
        let reservations = self.store.list_by_customer(customer_id).await?;
        self.with_line_items(reservations).await
    }

    /// Reservations on `date` in time order, optionally only one status.
    ///
    /// # Errors
    ///
    /// [`ReservationError::Persistence`] on storage failure.
    pub async fn list_by_date(
        &self,
        date: NaiveDate,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationDetail>, ReservationError> {
        let reservations = self.store.list_by_date(date, status).await?;
        self.with_line_items(reservations).await
    }

    /// Applies a gateway callback to one payment of the reservation.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidRequest`] for a blank status.
    /// - [`ReservationError::ReservationNotFound`] if `id` does not exist.
    /// - [`ReservationError::PaymentNotFound`] if the payment is not an
    ///   active child of the reservation.
    pub async fn reconcile_payment(
        &self,
        id: ReservationId,
        payment_id: PaymentId,
        update: PaymentUpdate,
        actor: i64,
    ) -> Result<PaymentTransaction, ReservationError> {
        if update.status.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(
                "payment status is required".to_string(),
            ));
        }
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        load_for_update(&mut tx, id).await?;
        let payment = tx
            .update_payment(id, payment_id, &update, actor, now)
            .await?
            .ok_or(ReservationError::PaymentNotFound {
                reservation_id: id,
                payment_id,
            })?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %id,
            payment_id = %payment_id,
            status = %payment.status,
            "payment reconciled"
        );
        let _ = self.event_bus.publish(ReservationEvent::PaymentReconciled {
            reservation_id: id,
            status: payment.status.clone(),
            timestamp: now,
        });
        Ok(payment)
    }

    async fn transition(
        &self,
        id: ReservationId,
        target: ReservationStatus,
        actor: i64,
    ) -> Result<ReservationDetail, ReservationError> {
        self.write_status(id, target, actor, false).await
    }

    async fn write_status(
        &self,
        id: ReservationId,
        target: ReservationStatus,
        actor: i64,
        overridden: bool,
    ) -> Result<ReservationDetail, ReservationError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut reservation = load_for_update(&mut tx, id).await?;
        let from = reservation.status;
        if !overridden {
            check_transition(id, from, target)?;
        }

        apply_status(&mut reservation, target, actor, now);
        tx.update_reservation(&reservation).await?;
        let notification = record_lifecycle(
            &mut tx,
            &reservation,
            NotificationType::for_status(target),
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            reservation_id = %id,
            code = %reservation.code,
            %from,
            to = %target,
            overridden,
            "reservation status changed"
        );
        let _ = self.event_bus.publish(ReservationEvent::StatusChanged {
            reservation_id: id,
            from,
            to: target,
            overridden,
            timestamp: now,
        });
        publish_recorded(&self.event_bus, &notification);

        let line_items = self.store.line_items(id, false).await?;
        Ok(ReservationDetail {
            reservation,
            line_items,
        })
    }

    async fn with_line_items(
        &self,
        reservations: Vec<Reservation>,
    ) -> Result<Vec<ReservationDetail>, ReservationError> {
        let mut details = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let line_items = self.store.line_items(reservation.id, false).await?;
            details.push(ReservationDetail {
                reservation,
                line_items,
            });
        }
        Ok(details)
    }
}

async fn load_for_update<T: StoreTx>(
    tx: &mut T,
    id: ReservationId,
) -> Result<Reservation, ReservationError> {
    tx.reservation_for_update(id)
        .await?
        .ok_or(ReservationError::ReservationNotFound(id))
}

fn check_transition(
    id: ReservationId,
    from: ReservationStatus,
    to: ReservationStatus,
) -> Result<(), ReservationError> {
    if from == to && to != ReservationStatus::Paid {
        return Err(ReservationError::AlreadyInStatus { id, status: from });
    }
    if !from.can_transition_to(to) {
        return Err(ReservationError::IllegalTransition { id, from, to });
    }
    Ok(())
}

/// `cancelled_at` is set exactly while the status is `CANCELLED`.
fn apply_status(
    reservation: &mut Reservation,
    target: ReservationStatus,
    actor: i64,
    now: DateTime<Utc>,
) {
    reservation.cancelled_at = if target == ReservationStatus::Cancelled {
        reservation.cancelled_at.or(Some(now))
    } else {
        None
    };
    reservation.status = target;
    reservation.audit.touch(actor, now);
}
