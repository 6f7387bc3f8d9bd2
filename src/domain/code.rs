//! Human-readable reservation codes: `RES-{yyyyMMdd}-{NNN}`.
//!
//! The correlative is per day and starts at `001`. Allocation (max existing
//! correlative + 1) happens inside the creating transaction while the
//! day's advisory lock is held, see [`crate::service::ReservationService`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const PREFIX: &str = "RES";

/// A reservation code. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ReservationCode(String);

impl ReservationCode {
    /// Builds the code for `date` with the given correlative.
    ///
    /// Correlatives above 999 are rendered with as many digits as they need.
    #[must_use]
    pub fn new(date: NaiveDate, correlative: u32) -> Self {
        Self(format!("{}{correlative:03}", Self::day_prefix(date)))
    }

    /// Prefix shared by every code issued for `date`, e.g. `RES-20250601-`.
    #[must_use]
    pub fn day_prefix(date: NaiveDate) -> String {
        format!("{PREFIX}-{}-", date.format("%Y%m%d"))
    }

    /// Wraps a code loaded from storage.
    #[must_use]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Returns the code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the correlative if this code was issued for `date`.
    ///
    /// Malformed suffixes count as `None` so a hand-edited row never blocks
    /// allocation.
    #[must_use]
    pub fn correlative_for(&self, date: NaiveDate) -> Option<u32> {
        self.0
            .strip_prefix(Self::day_prefix(date).as_str())
            .and_then(|suffix| suffix.parse().ok())
    }

    /// Next code for `date` given the codes already issued that day.
    #[must_use]
    pub fn next_after<'a, I>(date: NaiveDate, existing: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let max = existing
            .into_iter()
            .filter_map(|code| code.correlative_for(date))
            .max()
            .unwrap_or(0);
        Self::new(date, max.saturating_add(1))
    }
}

impl fmt::Display for ReservationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
