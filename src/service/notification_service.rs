//! Notification recording and lookup.
//!
//! Recording only persists the intent. Delivery is the dispatcher's job and
//! happens after commit.

use chrono::{DateTime, Utc};

use crate::domain::{
    EventBus, NewNotification, Notification, NotificationId, NotificationType, Reservation,
    ReservationEvent, ReservationId,
};
use crate::error::ReservationError;
use crate::persistence::{ReservationStore, StoreTx};

/// Records and serves notification intents.
#[derive(Debug, Clone)]
pub struct NotificationService<S> {
    store: S,
    event_bus: EventBus,
}

impl<S: ReservationStore> NotificationService<S> {
    /// Creates a new `NotificationService`.
    #[must_use]
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Records a notification for an existing reservation.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::ReservationNotFound`] if the reservation
    /// does not exist, [`ReservationError::InvalidRequest`] for a blank
    /// message and [`ReservationError::Persistence`] on storage failure.
    pub async fn record(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, ReservationError> {
        if notification.message.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(
                "message is required".to_string(),
            ));
        }
        let mut tx = self.store.begin().await?;
        if tx
            .reservation_for_update(notification.reservation_id)
            .await?
            .is_none()
        {
            return Err(ReservationError::ReservationNotFound(
                notification.reservation_id,
            ));
        }
        let record = tx.insert_notification(notification, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            notification_id = %record.id,
            reservation_id = %record.reservation_id,
            notification_type = %record.notification_type,
            "notification recorded"
        );
        publish_recorded(&self.event_bus, &record);
        Ok(record)
    }

    /// Notifications of a reservation, oldest first. Unknown reservations
    /// simply have none.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] on storage failure.
    pub async fn list_for_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<Notification>, ReservationError> {
        self.store.notifications_for(reservation_id).await
    }

    /// Loads one notification.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotificationNotFound`] if it does not
    /// exist.
    pub async fn get(&self, id: NotificationId) -> Result<Notification, ReservationError> {
        self.store
            .find_notification(id)
            .await?
            .ok_or(ReservationError::NotificationNotFound(id))
    }
}

/// Records the lifecycle notification for `reservation` inside the caller's
/// unit of work, so it commits or rolls back with the transition.
///
/// # Errors
///
/// Returns [`ReservationError::Persistence`] on storage failure.
pub async fn record_lifecycle<T: StoreTx>(
    tx: &mut T,
    reservation: &Reservation,
    notification_type: NotificationType,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<Notification, ReservationError> {
    let intent =
        NewNotification::lifecycle(reservation.id, &reservation.code, notification_type, actor);
    tx.insert_notification(intent, now).await
}

/// Announces a committed notification to the dispatcher.
pub(crate) fn publish_recorded(event_bus: &EventBus, notification: &Notification) {
    let _ = event_bus.publish(ReservationEvent::NotificationRecorded {
        reservation_id: notification.reservation_id,
        notification_id: notification.id,
        notification_type: notification.notification_type,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NotificationChannel, NotificationStatus, ReservationDraft};
    use crate::persistence::MemoryStore;
    use crate::service::ReservationService;
    use chrono::{NaiveDate, NaiveTime};

    fn manual(reservation_id: ReservationId) -> NewNotification {
        NewNotification {
            reservation_id,
            notification_type: NotificationType::Update,
            channel: NotificationChannel::Whatsapp,
            message: "Your table is ready".to_string(),
            status: NotificationStatus::Pending,
            sent_at: None,
            created_by: 3,
        }
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let service = NotificationService::new(MemoryStore::new(), EventBus::new(8));
        let result = service.record(manual(ReservationId::new(404))).await;
        assert!(matches!(
            result,
            Err(ReservationError::ReservationNotFound(id)) if id == ReservationId::new(404)
        ));
    }

    #[tokio::test]
    async fn recorded_notification_is_listed_and_fetchable() {
        let store = MemoryStore::new();
        let bus = EventBus::new(8);
        let reservations = ReservationService::new(store.clone(), bus.clone());
        let notifications = NotificationService::new(store, bus);

        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap_or_default();
        let time = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default();
        let Ok(created) = reservations
            .create(ReservationDraft::for_tables(10, date, time, &[2]), 1)
            .await
        else {
            panic!("create failed");
        };
        let id = created.reservation.id;

        let Ok(record) = notifications.record(manual(id)).await else {
            panic!("record failed");
        };
        assert_eq!(record.channel, NotificationChannel::Whatsapp);

        let Ok(listed) = notifications.list_for_reservation(id).await else {
            panic!("list failed");
        };
        let types: Vec<_> = listed.iter().map(|n| n.notification_type).collect();
        assert_eq!(types, vec![NotificationType::Creation, NotificationType::Update]);

        let Ok(fetched) = notifications.get(record.id).await else {
            panic!("get failed");
        };
        assert_eq!(fetched, record);
        assert!(matches!(
            notifications.get(NotificationId::new(9999)).await,
            Err(ReservationError::NotificationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_message_rejected() {
        let service = NotificationService::new(MemoryStore::new(), EventBus::new(8));
        let mut intent = manual(ReservationId::new(1));
        intent.message = "   ".to_string();
        assert!(matches!(
            service.record(intent).await,
            Err(ReservationError::InvalidRequest(_))
        ));
    }
}
