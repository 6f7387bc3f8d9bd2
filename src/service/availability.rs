//! Availability checks and the schedule reporter.
//!
//! A slot is held by a *live* booking: the reservation is active and not
//! cancelled and, for tables, the table booking itself is active. Conflicts
//! are exact-slot; there is no notion of duration.

use chrono::{NaiveDate, NaiveTime};

use crate::domain::schedule::{build_schedule, shift_availability};
use crate::domain::{
    BookingSlot, EventShift, ReservationDraft, ReservationId, ScheduleSlot, ShiftAvailability,
};
use crate::error::ReservationError;
use crate::persistence::{ReservationStore, StoreTx};

/// Read-only availability queries. Takes no locks.
#[derive(Debug, Clone)]
pub struct AvailabilityService<S> {
    store: S,
}

impl<S: ReservationStore> AvailabilityService<S> {
    /// Creates a new `AvailabilityService`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `false` iff a live booking holds `table_id` at exactly `date` + `time`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    pub async fn is_table_available(
        &self,
        table_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ReservationError> {
        Ok(!self.store.is_table_booked(table_id, date, time).await?)
    }

    /// `false` iff a live event reservation holds the event type for the
    /// shift on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    pub async fn is_event_available(
        &self,
        event_type_id: i64,
        date: NaiveDate,
        shift: EventShift,
    ) -> Result<bool, ReservationError> {
        Ok(!self.store.is_event_booked(event_type_id, date, shift).await?)
    }

    /// Full-day grid of the sixteen fixed slots for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    pub async fn schedule(&self, date: NaiveDate) -> Result<Vec<ScheduleSlot>, ReservationError> {
        let tables = self.store.active_tables().await?;
        let booked = self.store.booked_table_slots(date).await?;
        Ok(build_schedule(&tables, &booked))
    }

    /// Available and occupied event shifts for `date`, across every event
    /// type or for one type only.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    pub async fn event_shifts(
        &self,
        date: NaiveDate,
        event_type_id: Option<i64>,
    ) -> Result<ShiftAvailability, ReservationError> {
        let occupied = self.store.booked_event_shifts(date, event_type_id).await?;
        Ok(shift_availability(&occupied))
    }
}

/// Rejects `draft` if any slot it would hold is taken by another live
/// reservation. `exclude` skips the reservation being updated.
///
/// Runs inside the writer's unit of work, after the date lock, so the
/// answer stays valid until commit.
///
/// # Errors
///
/// Returns [`ReservationError::TableUnavailable`] for the first taken
/// table, [`ReservationError::EventUnavailable`] for a taken event slot.
pub async fn ensure_available<T: StoreTx>(
    tx: &mut T,
    draft: &ReservationDraft,
    exclude: Option<ReservationId>,
) -> Result<(), ReservationError> {
    let date = draft.reservation_date;
    // Event reservations may seat tables at an arrival time; those hold the
    // table slot like any table booking.
    if let Some(time) = draft.slot.time() {
        for table_id in draft.line_items.table_ids() {
            if tx.table_conflict(table_id, date, time, exclude).await? {
                tracing::warn!(table_id, %date, %time, "table not available");
                return Err(ReservationError::TableUnavailable {
                    table_id,
                    date,
                    time,
                });
            }
        }
    }
    if let BookingSlot::Event {
        event_type_id,
        shift,
        ..
    } = draft.slot
    {
        if tx.event_conflict(event_type_id, date, shift, exclude).await? {
            tracing::warn!(event_type_id, %date, %shift, "event slot not available");
            return Err(ReservationError::EventUnavailable {
                event_type_id,
                date,
                shift,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{DiningTable, EventBus};
    use crate::persistence::MemoryStore;
    use crate::service::ReservationService;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default()
    }

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
    }

    fn catalog() -> Vec<DiningTable> {
        (1..=6)
            .map(|id| DiningTable {
                id,
                code: format!("M-{id:02}"),
                capacity: 4,
                location: None,
                active: true,
            })
            .collect()
    }

    fn services() -> (ReservationService<MemoryStore>, AvailabilityService<MemoryStore>) {
        let store = MemoryStore::with_tables(catalog());
        (
            ReservationService::new(store.clone(), EventBus::new(16)),
            AvailabilityService::new(store),
        )
    }

    #[tokio::test]
    async fn schedule_round_trip() {
        let (reservations, availability) = services();
        let draft = ReservationDraft::for_tables(10, day(), at(19), &[5]);
        let Ok(_) = reservations.create(draft, 1).await else {
            panic!("create failed");
        };

        let Ok(grid) = availability.schedule(day()).await else {
            panic!("schedule failed");
        };
        assert_eq!(grid.len(), 16);
        for slot in &grid {
            let Some(t5) = slot.tables.iter().find(|t| t.id == 5) else {
                panic!("table 5 missing from slot {}", slot.time);
            };
            assert_eq!(t5.available, slot.time != at(19), "slot {}", slot.time);
            assert!(slot.available);
        }
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_slot() {
        let (reservations, availability) = services();
        let draft = ReservationDraft::for_tables(10, day(), at(13), &[2]);
        let Ok(created) = reservations.create(draft, 1).await else {
            panic!("create failed");
        };
        assert!(matches!(
            availability.is_table_available(2, day(), at(13)).await,
            Ok(false)
        ));

        let Ok(_) = reservations.cancel(created.reservation.id, 1).await else {
            panic!("cancel failed");
        };
        assert!(matches!(
            availability.is_table_available(2, day(), at(13)).await,
            Ok(true)
        ));
    }

    #[tokio::test]
    async fn event_shifts_split_and_filter() {
        let (reservations, availability) = services();
        let draft = ReservationDraft::for_event(10, day(), 7, EventShift::Afternoon);
        let Ok(_) = reservations.create(draft, 1).await else {
            panic!("create failed");
        };

        let Ok(all) = availability.event_shifts(day(), None).await else {
            panic!("shifts failed");
        };
        assert_eq!(all.available_shifts, vec![1, 3]);
        assert_eq!(all.occupied_shifts, vec![2]);

        let Ok(other_type) = availability.event_shifts(day(), Some(8)).await else {
            panic!("shifts failed");
        };
        assert_eq!(other_type.available_shifts, vec![1, 2, 3]);

        assert!(matches!(
            availability
                .is_event_available(7, day(), EventShift::Afternoon)
                .await,
            Ok(false)
        ));
        assert!(matches!(
            availability
                .is_event_available(7, day(), EventShift::Evening)
                .await,
            Ok(true)
        ));
    }
}
