//! Outbox dispatcher for notification intents.
//!
//! Intents are committed with their reservation change in status `PENDING`.
//! The dispatcher delivers them after commit and marks them `SENT`. It wakes
//! on notification events from the [`EventBus`](crate::domain::EventBus) and
//! on a fixed poll period, so rows left behind by a crash or a lagged
//! receiver are still picked up. Delivery is at-least-once.
//!
//! A failed delivery is rescheduled with exponential backoff and queued
//! behind everything already due. After [`RetryPolicy::max_attempts`]
//! failures the notification is parked as `FAILED`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use crate::domain::{Notification, NotificationWakeups};
use crate::error::ReservationError;
use crate::persistence::ReservationStore;

/// A delivery attempt that did not reach the customer.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Delivers one notification over its channel.
pub trait NotificationSender: Send + Sync + fmt::Debug + 'static {
    /// Sends `notification`. A failure leaves it pending for the next round.
    fn send(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Sender that writes each notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

impl NotificationSender for LogSender {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            notification_id = %notification.id,
            reservation_id = %notification.reservation_id,
            channel = %notification.channel,
            message = %notification.message,
            "notification delivered"
        );
        Ok(())
    }
}

/// Backoff for failed deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures before a notification is parked.
    pub max_attempts: u32,
    /// Delay after the first failure. Doubles per further failure.
    pub base_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// When to try again after the `failures`-th failure, or `None` once
    /// the budget is spent.
    #[must_use]
    pub fn retry_at(&self, failures: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if failures >= self.max_attempts {
            return None;
        }
        let factor = 1_u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay));
        let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        Some(now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }
}

/// Outcome of one outbox round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Delivered and marked sent.
    pub sent: usize,
    /// Rescheduled after a delivery error.
    pub failed: usize,
    /// Parked after the last allowed attempt.
    pub parked: usize,
}

/// Drains pending notifications through a [`NotificationSender`].
#[derive(Debug)]
pub struct NotificationDispatcher<S, N> {
    store: S,
    sender: N,
    batch_size: usize,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl<S: ReservationStore, N: NotificationSender> NotificationDispatcher<S, N> {
    /// Creates a dispatcher that hands at most `batch_size` notifications to
    /// `sender` per round.
    #[must_use]
    pub fn new(store: S, sender: N, batch_size: usize, poll_interval: Duration) -> Self {
        Self {
            store,
            sender,
            batch_size: batch_size.max(1),
            poll_interval,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the default [`RetryPolicy`].
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs one round over the oldest pending notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Persistence`] if the outbox cannot be
    /// read or a delivery cannot be recorded.
    pub async fn dispatch_pending(&self) -> Result<DispatchReport, ReservationError> {
        let pending = self
            .store
            .pending_notifications(self.batch_size, Utc::now())
            .await?;
        let mut report = DispatchReport::default();
        for notification in pending {
            match self.sender.send(&notification).await {
                Ok(()) => {
                    if self
                        .store
                        .mark_notification_sent(notification.id, Utc::now())
                        .await?
                    {
                        report.sent += 1;
                    }
                }
                Err(e) => {
                    let now = Utc::now();
                    let failures = u32::try_from(notification.attempts)
                        .unwrap_or(0)
                        .saturating_add(1);
                    let retry_at = self.retry.retry_at(failures, now);
                    if !self
                        .store
                        .record_delivery_failure(notification.id, retry_at, now)
                        .await?
                    {
                        continue;
                    }
                    if let Some(at) = retry_at {
                        tracing::warn!(
                            notification_id = %notification.id,
                            attempt = failures,
                            retry_at = %at,
                            error = %e,
                            "notification delivery failed, will retry"
                        );
                        report.failed += 1;
                    } else {
                        tracing::error!(
                            notification_id = %notification.id,
                            attempts = failures,
                            error = %e,
                            "notification delivery abandoned"
                        );
                        report.parked += 1;
                    }
                }
            }
        }
        if report != DispatchReport::default() {
            tracing::debug!(
                sent = report.sent,
                failed = report.failed,
                parked = report.parked,
                "outbox round"
            );
        }
        Ok(report)
    }

    /// Runs rounds until the event bus closes.
    pub async fn run(self, mut wakeups: NotificationWakeups) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            batch_size = self.batch_size,
            poll_secs = self.poll_interval.as_secs(),
            "notification dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                event = wakeups.recv() => match event {
                    Ok(event) => {
                        tracing::debug!(
                            event = event.event_type_str(),
                            reservation_id = %event.reservation_id(),
                            "dispatcher woken"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "dispatcher lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
            if let Err(e) = self.dispatch_pending().await {
                tracing::error!(error = %e, "outbox round failed");
            }
        }
        tracing::info!("notification dispatcher stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{NaiveDate, NaiveTime};
    use tokio::sync::Mutex;

    use crate::domain::{
        EventBus, NotificationId, NotificationStatus, ReservationDraft, ReservationId,
    };
    use crate::persistence::MemoryStore;
    use crate::service::ReservationService;

    #[derive(Debug, Clone, Default)]
    struct RecordingSender {
        delivered: Arc<Mutex<Vec<NotificationId>>>,
        failing: Arc<AtomicBool>,
        unreachable: Arc<Mutex<HashSet<ReservationId>>>,
    }

    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst)
                || self
                    .unreachable
                    .lock()
                    .await
                    .contains(&notification.reservation_id)
            {
                return Err(DeliveryError("gateway down".to_string()));
            }
            self.delivered.lock().await.push(notification.id);
            Ok(())
        }
    }

    fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    async fn reservation_at(
        service: &ReservationService<MemoryStore>,
        table_id: i64,
    ) -> ReservationId {
        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap_or_default();
        let time = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default();
        let Ok(detail) = service
            .create(ReservationDraft::for_tables(10, date, time, &[table_id]), 1)
            .await
        else {
            panic!("create failed");
        };
        detail.reservation.id
    }

    async fn reservation(service: &ReservationService<MemoryStore>) -> ReservationId {
        reservation_at(service, 2).await
    }

    #[test]
    fn backoff_doubles_up_to_the_cap_then_gives_up() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(90),
        };
        let now = Utc::now();
        let delay = |failures| {
            policy
                .retry_at(failures, now)
                .map(|at| (at - now).num_seconds())
        };
        assert_eq!(delay(1), Some(30));
        assert_eq!(delay(2), Some(60));
        assert_eq!(delay(3), Some(90));
        assert_eq!(delay(4), None);
        assert_eq!(RetryPolicy::default().retry_at(40, now), None);
    }

    #[tokio::test]
    async fn round_marks_delivered_notifications_sent() {
        let store = MemoryStore::new();
        let service = ReservationService::new(store.clone(), EventBus::new(16));
        let id = reservation(&service).await;
        let Ok(_) = service.check_in(id, 1).await else {
            panic!("check-in failed");
        };

        let sender = RecordingSender::default();
        let dispatcher =
            NotificationDispatcher::new(store.clone(), sender.clone(), 10, Duration::from_secs(60));
        let Ok(report) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(
            report,
            DispatchReport {
                sent: 2,
                ..DispatchReport::default()
            }
        );
        assert_eq!(sender.delivered.lock().await.len(), 2);

        let Ok(notifications) = store.notifications_for(id).await else {
            panic!("list failed");
        };
        assert!(notifications.iter().all(|n| n.status == NotificationStatus::Sent));
        assert!(notifications.iter().all(|n| n.sent_at.is_some()));

        let Ok(idle) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(idle, DispatchReport::default());
    }

    #[tokio::test]
    async fn failed_delivery_waits_for_its_backoff() {
        let store = MemoryStore::new();
        let service = ReservationService::new(store.clone(), EventBus::new(16));
        let id = reservation(&service).await;

        let sender = RecordingSender::default();
        sender.failing.store(true, Ordering::SeqCst);
        let dispatcher =
            NotificationDispatcher::new(store.clone(), sender.clone(), 10, Duration::from_secs(60));
        let Ok(report) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(
            report,
            DispatchReport {
                failed: 1,
                ..DispatchReport::default()
            }
        );

        sender.failing.store(false, Ordering::SeqCst);
        let Ok(early) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(early, DispatchReport::default());

        let Ok(notifications) = store.notifications_for(id).await else {
            panic!("list failed");
        };
        let Some(n) = notifications.first() else {
            panic!("notification missing");
        };
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.attempts, 1);
        assert!(n.next_attempt_at > Utc::now());
    }

    #[tokio::test]
    async fn failed_delivery_retries_once_due() {
        let store = MemoryStore::new();
        let service = ReservationService::new(store.clone(), EventBus::new(16));
        reservation(&service).await;

        let sender = RecordingSender::default();
        sender.failing.store(true, Ordering::SeqCst);
        let dispatcher =
            NotificationDispatcher::new(store.clone(), sender.clone(), 10, Duration::from_secs(60))
                .with_retry(immediate(5));
        let Ok(_) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };

        sender.failing.store(false, Ordering::SeqCst);
        let Ok(retry) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(
            retry,
            DispatchReport {
                sent: 1,
                ..DispatchReport::default()
            }
        );
    }

    #[tokio::test]
    async fn undeliverable_notifications_do_not_starve_the_batch() {
        let store = MemoryStore::new();
        let service = ReservationService::new(store.clone(), EventBus::new(16));
        let bad_a = reservation_at(&service, 1).await;
        let bad_b = reservation_at(&service, 2).await;
        let good = reservation_at(&service, 3).await;

        let sender = RecordingSender::default();
        sender.unreachable.lock().await.extend([bad_a, bad_b]);
        let dispatcher =
            NotificationDispatcher::new(store.clone(), sender.clone(), 2, Duration::from_secs(60))
                .with_retry(immediate(3));

        let mut total = DispatchReport::default();
        for _ in 0..5 {
            let Ok(round) = dispatcher.dispatch_pending().await else {
                panic!("round failed");
            };
            total.sent += round.sent;
            total.failed += round.failed;
            total.parked += round.parked;
        }
        assert_eq!(total.sent, 1);
        assert_eq!(total.failed, 4);
        assert_eq!(total.parked, 2);

        let Ok(delivered) = store.notifications_for(good).await else {
            panic!("list failed");
        };
        assert!(delivered.iter().all(|n| n.status == NotificationStatus::Sent));
        for id in [bad_a, bad_b] {
            let Ok(parked) = store.notifications_for(id).await else {
                panic!("list failed");
            };
            assert!(
                parked
                    .iter()
                    .all(|n| n.status == NotificationStatus::Failed && n.attempts == 3)
            );
        }

        let Ok(idle) = dispatcher.dispatch_pending().await else {
            panic!("round failed");
        };
        assert_eq!(idle, DispatchReport::default());
    }

    #[tokio::test]
    async fn run_delivers_on_events_and_stops_when_bus_closes() {
        let store = MemoryStore::new();
        let bus = EventBus::new(16);
        let sender = RecordingSender::default();
        let dispatcher =
            NotificationDispatcher::new(store.clone(), sender.clone(), 10, Duration::from_secs(3600));
        let handle = tokio::spawn(dispatcher.run(bus.subscribe_notifications()));

        let service = ReservationService::new(store, bus);
        reservation(&service).await;

        let mut delivered = 0;
        for _ in 0..100 {
            delivered = sender.delivered.lock().await.len();
            if delivered == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 1);

        drop(service);
        let stopped = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }
}
