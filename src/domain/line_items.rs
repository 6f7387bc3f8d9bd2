//! Child collections of a reservation: table bookings, products, event
//! services and payment transactions.
//!
//! Children are never deleted. An update marks the current set inactive and
//! inserts a fresh one, so superseded rows stay around for audit while every
//! availability and reporting query filters on `active`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::reservation::Audit;
use super::{LineItemId, PaymentId, ReservationId};
use crate::error::ReservationError;

/// A table held by a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TableBooking {
    /// Line item id.
    pub id: LineItemId,
    /// Owning reservation.
    pub reservation_id: ReservationId,
    /// Catalog table id.
    pub table_id: i64,
    /// Free-text note.
    pub observation: Option<String>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// `false` once superseded by an update.
    pub active: bool,
}

/// A pre-ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductLine {
    /// Line item id.
    pub id: LineItemId,
    /// Owning reservation.
    pub reservation_id: ReservationId,
    /// Catalog product id.
    pub product_id: i64,
    /// Units ordered.
    pub quantity: i32,
    /// Line subtotal.
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    /// Free-text note.
    pub observation: Option<String>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// `false` once superseded by an update.
    pub active: bool,
}

/// An event service (decoration, music, catering...) attached to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventServiceLine {
    /// Line item id.
    pub id: LineItemId,
    /// Owning reservation.
    pub reservation_id: ReservationId,
    /// Catalog service id.
    pub service_id: i64,
    /// Units ordered.
    pub quantity: i32,
    /// Line subtotal.
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    /// Free-text note.
    pub observation: Option<String>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// `false` once superseded by an update.
    pub active: bool,
}

/// Result of a payment-gateway charge, recorded against the reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentTransaction {
    /// Transaction id.
    pub id: PaymentId,
    /// Owning reservation.
    pub reservation_id: ReservationId,
    /// When the payment was made.
    pub payment_date: DateTime<Utc>,
    /// Method label (card, cash, transfer...).
    pub payment_method: String,
    /// Amount charged.
    #[schema(value_type = String)]
    pub amount: Decimal,
    /// Gateway-reported status.
    pub status: String,
    /// Gateway reference.
    pub external_transaction_id: Option<String>,
    /// Audit columns.
    #[serde(flatten)]
    pub audit: Audit,
    /// `false` once superseded by an update.
    pub active: bool,
}

/// The four child collections of one reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineItems {
    /// Table bookings.
    pub tables: Vec<TableBooking>,
    /// Product lines.
    pub products: Vec<ProductLine>,
    /// Event service lines.
    pub events: Vec<EventServiceLine>,
    /// Payment transactions.
    pub payments: Vec<PaymentTransaction>,
}

/// New table booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBookingDraft {
    /// Catalog table id.
    pub table_id: i64,
    /// Free-text note.
    pub observation: Option<String>,
}

/// New product line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLineDraft {
    /// Catalog product id.
    pub product_id: i64,
    /// Units, at least 1.
    pub quantity: i32,
    /// Non-negative subtotal.
    pub subtotal: Decimal,
    /// Free-text note.
    pub observation: Option<String>,
}

/// New event service line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventServiceDraft {
    /// Catalog service id.
    pub service_id: i64,
    /// Units, at least 1.
    pub quantity: i32,
    /// Non-negative subtotal.
    pub subtotal: Decimal,
    /// Free-text note.
    pub observation: Option<String>,
}

/// New payment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDraft {
    /// When the payment was made.
    pub payment_date: DateTime<Utc>,
    /// Method label.
    pub payment_method: String,
    /// Non-negative amount.
    pub amount: Decimal,
    /// Gateway-reported status.
    pub status: String,
    /// Gateway reference.
    pub external_transaction_id: Option<String>,
    /// Recorder; defaults to the acting user.
    pub created_by: Option<i64>,
}

/// Replacement set for all four child collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineItemDraft {
    /// Tables to hold.
    pub tables: Vec<TableBookingDraft>,
    /// Products to pre-order.
    pub products: Vec<ProductLineDraft>,
    /// Event services.
    pub events: Vec<EventServiceDraft>,
    /// Payment results.
    pub payments: Vec<PaymentDraft>,
}

impl LineItemDraft {
    /// Draft holding only the given tables.
    #[must_use]
    pub fn with_tables(table_ids: &[i64]) -> Self {
        Self {
            tables: table_ids
                .iter()
                .map(|&table_id| TableBookingDraft {
                    table_id,
                    observation: None,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Distinct table ids in request order.
    #[must_use]
    pub fn table_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.tables
            .iter()
            .map(|t| t.table_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Sum of product and event-service subtotals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.products
            .iter()
            .map(|p| p.subtotal)
            .chain(self.events.iter().map(|e| e.subtotal))
            .sum()
    }

    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidRequest`] for duplicate tables,
    /// non-positive quantities, negative money or blank payment fields.
    pub fn validate(&self) -> Result<(), ReservationError> {
        if self.table_ids().len() != self.tables.len() {
            return Err(ReservationError::InvalidRequest(
                "the same table is listed twice".to_string(),
            ));
        }
        for p in &self.products {
            check_quantity_and_money("product", p.quantity, p.subtotal)?;
        }
        for e in &self.events {
            check_quantity_and_money("event service", e.quantity, e.subtotal)?;
        }
        for pay in &self.payments {
            if pay.amount.is_sign_negative() {
                return Err(ReservationError::InvalidRequest(
                    "payment amount must not be negative".to_string(),
                ));
            }
            if pay.payment_method.trim().is_empty() || pay.status.trim().is_empty() {
                return Err(ReservationError::InvalidRequest(
                    "payment method and status are required".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn check_quantity_and_money(
    what: &str,
    quantity: i32,
    subtotal: Decimal,
) -> Result<(), ReservationError> {
    if quantity < 1 {
        return Err(ReservationError::InvalidRequest(format!(
            "{what} quantity must be at least 1"
        )));
    }
    if subtotal.is_sign_negative() {
        return Err(ReservationError::InvalidRequest(format!(
            "{what} subtotal must not be negative"
        )));
    }
    Ok(())
}
