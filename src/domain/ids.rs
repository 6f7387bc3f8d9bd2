//! Type-safe identifiers for the reservation aggregate and its records.
//!
//! Every identifier is a newtype over the `BIGSERIAL` key assigned by the
//! store, so a reservation id cannot be passed where a notification id is
//! expected. Catalog references (tables, products, services, customers)
//! stay plain `i64` because the core never resolves them itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            ToSchema,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw store key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

record_id!(
    /// Identifier of a reservation (the aggregate root).
    ReservationId
);

record_id!(
    /// Identifier of a recorded notification intent.
    NotificationId
);

record_id!(
    /// Identifier of a payment transaction attached to a reservation.
    PaymentId
);

record_id!(
    /// Identifier of a reservation line item (table, product or event service).
    LineItemId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_key() {
        assert_eq!(ReservationId::new(42).to_string(), "42");
    }

    #[test]
    fn serde_is_transparent() {
        let Ok(json) = serde_json::to_string(&NotificationId::new(9)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "9");
        let Ok(back) = serde_json::from_str::<NotificationId>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, NotificationId::new(9));
    }

    #[test]
    fn ordering_follows_raw_key() {
        let mut ids = vec![PaymentId::new(3), PaymentId::new(1), PaymentId::new(2)];
        ids.sort();
        assert_eq!(ids.first().copied().map(PaymentId::get), Some(1));
    }
}
