use crate::checkable::Checkable;
use crate::{DeliveryChannel, NotificationMessage};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use vigil_common::types::{CheckResult, NotificationType};

/// A configured notification attached to a checkable.
///
/// The notification owns its own renotification policy: after every send
/// attempt it recomputes `next_notification_time` as now plus the configured
/// interval. The scheduling engine treats that timestamp as opaque and only
/// snapshots it when (re-)admitting the notification into its schedule.
pub struct Notification {
    id: String,
    name: String,
    checkable: Weak<Checkable>,
    channel: Arc<dyn DeliveryChannel>,
    renotify_interval: Duration,
    active: AtomicBool,
    send_state: Mutex<SendState>,
}

#[derive(Debug)]
struct SendState {
    next_notification: DateTime<Utc>,
    last_notification: Option<DateTime<Utc>>,
    sent_count: u64,
}

impl Notification {
    /// Creates an active notification and attaches it to the checkable.
    ///
    /// The first reminder becomes due one full interval from now, so it
    /// never coincides with the immediate send that a state change fires.
    pub fn new(
        name: impl Into<String>,
        checkable: &Arc<Checkable>,
        channel: Arc<dyn DeliveryChannel>,
        renotify_interval: std::time::Duration,
    ) -> Arc<Self> {
        let interval = Duration::from_std(renotify_interval).unwrap_or(Duration::zero());
        let notification = Arc::new(Self {
            id: vigil_common::id::next_id(),
            name: name.into(),
            checkable: Arc::downgrade(checkable),
            channel,
            renotify_interval: interval,
            active: AtomicBool::new(true),
            send_state: Mutex::new(SendState {
                next_notification: Utc::now() + interval,
                last_notification: None,
                sent_count: 0,
            }),
        });
        checkable.add_notification(notification.clone());
        notification
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning checkable, if it still exists. The scheduler must tolerate
    /// a dead reference at any time.
    pub fn checkable(&self) -> Option<Arc<Checkable>> {
        self.checkable.upgrade()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the notification as removed/disabled. Entries already in flight
    /// are dropped at dispatch completion instead of being re-admitted.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// When the next reminder for this notification becomes due.
    pub fn next_notification_time(&self) -> DateTime<Utc> {
        self.send_state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .next_notification
    }

    pub fn last_notification_time(&self) -> Option<DateTime<Utc>> {
        self.send_state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .last_notification
    }

    pub fn sent_count(&self) -> u64 {
        self.send_state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .sent_count
    }

    /// Executes one send attempt through the delivery channel.
    ///
    /// Inactive notifications skip delivery unless `force` is set. The
    /// next-due timestamp advances on every attempt, including failed and
    /// skipped ones, so a transient delivery error never stalls future
    /// scheduling.
    pub async fn execute(
        &self,
        notification_type: NotificationType,
        check_result: Option<CheckResult>,
        force: bool,
        reminder: bool,
    ) -> Result<()> {
        let now = Utc::now();
        let result = if self.is_active() || force {
            let message = NotificationMessage {
                notification_id: self.id.clone(),
                notification_name: self.name.clone(),
                checkable_name: self
                    .checkable()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default(),
                notification_type,
                state: check_result.as_ref().map(|cr| cr.state),
                output: check_result.as_ref().map(|cr| cr.output.clone()),
                reminder,
                sent_at: now,
            };
            tracing::debug!(
                notification = %self.name,
                notification_type = %notification_type,
                channel = self.channel.channel_name(),
                reminder,
                "Executing notification"
            );
            self.channel.send(&message).await
        } else {
            tracing::debug!(
                notification = %self.name,
                notification_type = %notification_type,
                "Skipping delivery for inactive notification"
            );
            Ok(())
        };

        let mut send_state = self.send_state.lock().unwrap_or_else(|p| p.into_inner());
        send_state.last_notification = Some(now);
        send_state.next_notification = now + self.renotify_interval;
        send_state.sent_count += 1;

        result
    }
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notification")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
