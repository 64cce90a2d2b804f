//! Domain model consumed by the notification-scheduling engine.
//!
//! A [`Checkable`] is a monitored entity with a soft/hard state machine and
//! a set of attached [`Notification`]s. State transitions and flapping
//! changes are published as [`CheckEvent`]s on an [`EventBus`]; the
//! scheduling engine subscribes and decides what to send. Actual message
//! delivery happens behind the [`DeliveryChannel`] seam.

pub mod checkable;
pub mod events;
pub mod notification;


use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_common::types::{NotificationType, ServiceState};

pub use checkable::Checkable;
pub use events::{CheckEvent, EventBus};
pub use notification::Notification;

/// Rendered payload handed to a delivery channel for one send attempt.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub notification_id: String,
    pub notification_name: String,
    pub checkable_name: String,
    pub notification_type: NotificationType,
    pub state: Option<ServiceState>,
    pub output: Option<String>,
    pub reminder: bool,
    pub sent_at: DateTime<Utc>,
}

/// A delivery channel that sends notification messages to an external
/// service (e.g., SMTP, webhook, paging gateway).
///
/// Implementations are injected into [`Notification`]s; the scheduling
/// engine never talks to a channel directly and never invokes one while
/// holding its own locks.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Delivers the message through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. Failures are logged by the
    /// caller and do not remove the notification from future scheduling.
    async fn send(&self, message: &NotificationMessage) -> Result<()>;

    /// Returns the channel type name (e.g., `"email"`, `"webhook"`).
    fn channel_name(&self) -> &str;
}
