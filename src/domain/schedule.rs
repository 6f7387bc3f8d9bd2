//! Fixed daily grid used by the availability screens.
//!
//! Sixteen hourly slots across three shifts: morning 08–12, afternoon
//! 13–18, evening 19–23. Occupancy is exact-slot: a booking at 19:00 holds
//! its tables for the 19:00 slot only.

use std::collections::HashSet;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::EventShift;

/// First and last bookable hour.
const OPENING_HOUR: u32 = 8;
const LAST_SLOT_HOUR: u32 = 23;

/// Restaurant table as read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiningTable {
    /// Catalog id.
    pub id: i64,
    /// Display code, e.g. `M-05`.
    pub code: String,
    /// Seats.
    pub capacity: i32,
    /// Area of the dining room.
    pub location: Option<String>,
    /// Catalog soft-delete flag.
    pub active: bool,
}

/// One table inside a schedule slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TableSlotAvailability {
    /// Catalog table id.
    pub id: i64,
    /// Display code.
    pub name: String,
    /// `false` when a live booking holds the table at this slot.
    pub available: bool,
}

/// One hourly slot of the daily grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScheduleSlot {
    /// Slot start, serialised `HH:MM:SS`.
    #[schema(value_type = String, example = "19:00:00")]
    pub time: NaiveTime,
    /// Shift the slot belongs to.
    pub shift: EventShift,
    /// `true` iff at least one table is free.
    pub available: bool,
    /// Per-table occupancy.
    pub tables: Vec<TableSlotAvailability>,
}

/// Event shift occupancy for one day, as shift codes (1, 2, 3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShiftAvailability {
    /// Shifts with no live event booking.
    pub available_shifts: Vec<i16>,
    /// Shifts already taken.
    pub occupied_shifts: Vec<i16>,
}

/// Shift containing the given hour, if it is a bookable hour.
#[must_use]
pub const fn shift_for_hour(hour: u32) -> Option<EventShift> {
    match hour {
        8..=12 => Some(EventShift::Morning),
        13..=18 => Some(EventShift::Afternoon),
        19..=23 => Some(EventShift::Evening),
        _ => None,
    }
}

/// Iterator over the sixteen fixed slots in day order.
pub fn slots() -> impl Iterator<Item = (NaiveTime, EventShift)> {
    (OPENING_HOUR..=LAST_SLOT_HOUR).filter_map(|hour| {
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        Some((time, shift_for_hour(hour)?))
    })
}

/// Builds the full-day grid from the active tables and the `(table, time)`
/// pairs held by live bookings.
#[must_use]
pub fn build_schedule(
    tables: &[DiningTable],
    booked: &HashSet<(i64, NaiveTime)>,
) -> Vec<ScheduleSlot> {
    slots()
        .map(|(time, shift)| {
            let tables: Vec<TableSlotAvailability> = tables
                .iter()
                .filter(|t| t.active)
                .map(|t| TableSlotAvailability {
                    id: t.id,
                    name: t.code.clone(),
                    available: !booked.contains(&(t.id, time)),
                })
                .collect();
            ScheduleSlot {
                time,
                shift,
                available: tables.iter().any(|t| t.available),
                tables,
            }
        })
        .collect()
}

/// Splits the three shifts into available and occupied.
#[must_use]
pub fn shift_availability(occupied: &HashSet<EventShift>) -> ShiftAvailability {
    let (taken, free): (Vec<EventShift>, Vec<EventShift>) =
        EventShift::ALL.into_iter().partition(|s| occupied.contains(s));
    ShiftAvailability {
        available_shifts: free.into_iter().map(EventShift::code).collect(),
        occupied_shifts: taken.into_iter().map(EventShift::code).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: i64) -> DiningTable {
        DiningTable {
            id,
            code: format!("M-{id:02}"),
            capacity: 4,
            location: None,
            active: true,
        }
    }

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
    }

    #[test]
    fn sixteen_slots_over_three_shifts() {
        let all: Vec<_> = slots().collect();
        assert_eq!(all.len(), 16);
        let count = |s| all.iter().filter(|(_, shift)| *shift == s).count();
        assert_eq!(count(EventShift::Morning), 5);
        assert_eq!(count(EventShift::Afternoon), 6);
        assert_eq!(count(EventShift::Evening), 5);
        assert_eq!(all.first().map(|(t, _)| *t), Some(at(8)));
        assert_eq!(all.last().map(|(t, _)| *t), Some(at(23)));
    }

    #[test]
    fn booking_blocks_only_its_slot() {
        let tables = vec![table(5), table(6)];
        let booked = HashSet::from([(5, at(19))]);
        let grid = build_schedule(&tables, &booked);
        for slot in &grid {
            let t5 = slot.tables.iter().find(|t| t.id == 5).map(|t| t.available);
            assert_eq!(t5, Some(slot.time != at(19)), "slot {}", slot.time);
            assert!(slot.available);
        }
    }

    #[test]
    fn slot_unavailable_when_every_table_taken() {
        let tables = vec![table(1)];
        let booked = HashSet::from([(1, at(12))]);
        let grid = build_schedule(&tables, &booked);
        let noon = grid.iter().find(|s| s.time == at(12));
        assert_eq!(noon.map(|s| s.available), Some(false));
    }

    #[test]
    fn no_tables_means_nothing_available() {
        let grid = build_schedule(&[], &HashSet::new());
        assert!(grid.iter().all(|s| !s.available && s.tables.is_empty()));
    }

    #[test]
    fn shift_split() {
        let result = shift_availability(&HashSet::from([EventShift::Afternoon]));
        assert_eq!(result.available_shifts, vec![1, 3]);
        assert_eq!(result.occupied_shifts, vec![2]);
    }
}
