//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::domain::EventBus;
use crate::persistence::ReservationStore;
use crate::service::{AvailabilityService, NotificationService, ReservationService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor. Generic over the store backend.
#[derive(Debug, Clone)]
pub struct AppState<S> {
    /// Reservation lifecycle and every write.
    pub reservation_service: Arc<ReservationService<S>>,
    /// Read-only availability queries.
    pub availability_service: Arc<AvailabilityService<S>>,
    /// Manual notifications and lookups.
    pub notification_service: Arc<NotificationService<S>>,
    /// Bus the notification dispatcher subscribes to.
    pub event_bus: EventBus,
    /// Runtime configuration.
    pub config: Arc<ServiceConfig>,
}

impl<S: ReservationStore> AppState<S> {
    /// Wires every service over `store`.
    #[must_use]
    pub fn new(store: S, config: ServiceConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        Self {
            reservation_service: Arc::new(ReservationService::new(
                store.clone(),
                event_bus.clone(),
            )),
            availability_service: Arc::new(AvailabilityService::new(store.clone())),
            notification_service: Arc::new(NotificationService::new(store, event_bus.clone())),
            event_bus,
            config: Arc::new(config),
        }
    }
}
