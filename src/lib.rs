//! # reservation-core
//!
//! Reservation lifecycle and availability service for a restaurant
//! backend: table and event bookings, a guarded status machine, per-day
//! reservation codes, availability grids and customer notifications.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── ReservationService / AvailabilityService /
//!     │   NotificationService (service/)
//!     ├── EventBus (domain/) ──► NotificationDispatcher (outbox)
//!     │
//!     ├── ReservationStore + StoreTx (persistence/)
//!     │
//!     └── PostgreSQL or in-memory store
//! ```
//!
//! Every write runs in a single store unit of work. Availability check,
//! code generation and inserts for one date are serialised, so two
//! concurrent bookings of the same slot never both succeed.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
