//! Closed enumerations of the reservation aggregate: lifecycle status,
//! reservation type and event shift.
//!
//! [`ReservationStatus`] owns the transition table. Named lifecycle
//! operations consult [`ReservationStatus::can_transition_to`]; only the
//! administrative override writes a status without asking it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ReservationError;

/// Lifecycle status of a reservation.
///
/// ```text
/// PENDING ──► CHECK_IN ──► CHECK_OUT ──► PAID
///    │  └──────────┴──────────────────►  ▲ (paid may settle early)
///    └──────┴──────────┴──► CANCELLED
/// ```
///
/// `PAID` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Initial state after creation.
    Pending,
    /// Guests have arrived.
    CheckIn,
    /// Guests have left; bill outstanding.
    CheckOut,
    /// Settled. Terminal.
    Paid,
    /// Cancelled by the customer or staff. Terminal.
    Cancelled,
}

impl ReservationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::CheckIn,
        Self::CheckOut,
        Self::Paid,
        Self::Cancelled,
    ];

    /// Canonical storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::CheckIn => "CHECK_IN",
            Self::CheckOut => "CHECK_OUT",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` when no lifecycle operation may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Transition table for the named lifecycle operations.
    ///
    /// `PAID -> PAID` is allowed: marking a reservation paid is idempotent.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::CheckIn)
                | (Self::CheckIn, Self::CheckOut)
                | (Self::Pending | Self::CheckIn | Self::CheckOut, Self::Paid)
                | (Self::Paid, Self::Paid)
                | (
                    Self::Pending | Self::CheckIn | Self::CheckOut,
                    Self::Cancelled
                )
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = ReservationError;

    /// Accepts the canonical names (any case, `-` or `_`) and the legacy
    /// Spanish labels still present in older rows.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "PENDING" | "PENDIENTE" => Ok(Self::Pending),
            "CHECK_IN" | "CHECKIN" => Ok(Self::CheckIn),
            "CHECK_OUT" | "CHECKOUT" => Ok(Self::CheckOut),
            "PAID" | "PAGADO" => Ok(Self::Paid),
            "CANCELLED" | "CANCELED" | "CANCELADO" => Ok(Self::Cancelled),
            _ => Err(ReservationError::InvalidStatus(s.to_string())),
        }
    }
}

/// What a reservation books: individual tables or an event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationType {
    /// One or more tables at a single time slot.
    #[serde(alias = "MESA", alias = "mesa", alias = "table")]
    Table,
    /// An event type occupying a whole shift.
    #[serde(alias = "EVENTO", alias = "evento", alias = "event")]
    Event,
}

impl ReservationType {
    /// Canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Event => "EVENT",
        }
    }
}

impl fmt::Display for ReservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationType {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TABLE" | "MESA" => Ok(Self::Table),
            "EVENT" | "EVENTO" => Ok(Self::Event),
            _ => Err(ReservationError::InvalidRequest(format!(
                "unknown reservation type: {s}"
            ))),
        }
    }
}

/// Event shift. Stored as its numeric code (1, 2, 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventShift {
    /// 08:00–12:00.
    Morning,
    /// 13:00–18:00.
    Afternoon,
    /// 19:00–23:00.
    Evening,
}

impl EventShift {
    /// Every shift in day order.
    pub const ALL: [Self; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// Numeric storage code.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Morning => 1,
            Self::Afternoon => 2,
            Self::Evening => 3,
        }
    }

    /// Inverse of [`EventShift::code`].
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Morning),
            2 => Some(Self::Afternoon),
            3 => Some(Self::Evening),
            _ => None,
        }
    }
}

impl fmt::Display for EventShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        })
    }
}

impl FromStr for EventShift {
    type Err = ReservationError;

    /// Accepts `1|2|3`, English names and the Spanish labels used by the
    /// booking front-end (`mañana`, `tarde`, `noche`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| ReservationError::InvalidShift(s.into()));
        }
        match trimmed.to_lowercase().as_str() {
            "morning" | "mañana" | "manana" => Ok(Self::Morning),
            "afternoon" | "tarde" => Ok(Self::Afternoon),
            "evening" | "night" | "noche" => Ok(Self::Evening),
            _ => Err(ReservationError::InvalidShift(s.to_string())),
        }
    }
}

/// Accepts the numeric code or any label [`EventShift::from_str`] knows.
impl<'de> Deserialize<'de> for EventShift {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown shift code: {code}"))),
            Raw::Label(label) => label.parse().map_err(serde::de::Error::custom),
        }
    }
}
