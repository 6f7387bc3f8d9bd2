//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every committed
//! mutation publishes a [`ReservationEvent`] through the bus; publishing
//! never blocks and never fails the request that triggered it.
//!
//! The notification outbox subscribes through
//! [`EventBus::subscribe_notifications`], which only wakes for events that
//! leave new pending notifications behind.

use tokio::sync::broadcast::{self, error::RecvError};

use super::ReservationEvent;

/// Broadcast bus for [`ReservationEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers. Subscribers must therefore treat events as hints and re-read
/// the store for the authoritative state.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ReservationEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: ReservationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReservationEvent> {
        self.sender.subscribe()
    }

    /// Creates a receiver for the notification outbox.
    #[must_use]
    pub fn subscribe_notifications(&self) -> NotificationWakeups {
        NotificationWakeups {
            rx: self.sender.subscribe(),
        }
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver that skips events with no pending notification behind them.
#[derive(Debug)]
pub struct NotificationWakeups {
    rx: broadcast::Receiver<ReservationEvent>,
}

impl NotificationWakeups {
    /// Waits for the next event that recorded notifications. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Lagged`] when the ring buffer overran this
    /// receiver, and [`RecvError::Closed`] once every bus handle is gone.
    pub async fn recv(&mut self) -> Result<ReservationEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.carries_notification() {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ReservationCode, ReservationId};
    use chrono::{NaiveDate, Utc};

    fn created(id: i64) -> ReservationEvent {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default();
        ReservationEvent::Created {
            reservation_id: ReservationId::new(id),
            code: ReservationCode::new(date, 1),
            timestamp: Utc::now(),
        }
    }

    fn reconciled(id: i64) -> ReservationEvent {
        ReservationEvent::PaymentReconciled {
            reservation_id: ReservationId::new(id),
            status: "APPROVED".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(created(1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_commit() {
        let bus = EventBus::new(100);
        let mut audit = bus.subscribe();
        let mut outbox = bus.subscribe_notifications();
        assert_eq!(bus.receiver_count(), 2);

        assert_eq!(bus.publish(created(7)), 2);

        let Ok(seen) = audit.recv().await else {
            panic!("audit receiver failed");
        };
        let Ok(woken) = outbox.recv().await else {
            panic!("outbox receiver failed");
        };
        assert_eq!(seen.reservation_id(), ReservationId::new(7));
        assert_eq!(woken.reservation_id(), ReservationId::new(7));
    }

    #[tokio::test]
    async fn outbox_skips_payment_reconciliation() {
        let bus = EventBus::new(100);
        let mut outbox = bus.subscribe_notifications();

        bus.publish(reconciled(3));
        bus.publish(reconciled(4));
        bus.publish(created(5));

        let Ok(event) = outbox.recv().await else {
            panic!("outbox receiver failed");
        };
        assert_eq!(event.event_type_str(), "created");
        assert_eq!(event.reservation_id(), ReservationId::new(5));
    }

    #[tokio::test]
    async fn outbox_reports_lag_and_close() {
        let bus = EventBus::new(2);
        let mut outbox = bus.subscribe_notifications();
        for id in 1..=4 {
            bus.publish(created(id));
        }
        assert!(matches!(outbox.recv().await, Err(RecvError::Lagged(2))));
        let Ok(next) = outbox.recv().await else {
            panic!("expected the newest events after lag");
        };
        assert_eq!(next.reservation_id(), ReservationId::new(3));

        drop(bus);
        let Ok(last) = outbox.recv().await else {
            panic!("buffered event lost");
        };
        assert_eq!(last.reservation_id(), ReservationId::new(4));
        assert!(matches!(outbox.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn dropped_subscribers_are_released() {
        let bus = EventBus::new(100);
        let rx = bus.subscribe();
        let _outbox = bus.subscribe_notifications();
        drop(rx);
        assert_eq!(bus.receiver_count(), 1);
    }
}
