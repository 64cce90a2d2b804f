//! Notification-scheduling engine.
//!
//! Given state-change and flapping events from monitored checkables, the
//! [`component::NotificationComponent`] decides whether an alert must fire
//! (see [`decision`]), sends it immediately, and keeps repeatable
//! notifications on a reminder schedule (see [`schedule`]) until the
//! underlying condition resolves or the notification is disabled.
//!
//! The schedule lives in a mutually-exclusive, dual-indexed set manipulated
//! by three paths: event ingestion, a dedicated scheduler task that wakes
//! exactly when the earliest entry matures, and dispatch completions that
//! re-admit still-active notifications.

pub mod component;
pub mod config;
pub mod decision;
pub mod error;
pub mod schedule;


pub use component::{NotificationComponent, SchedulerStatus};
pub use config::NotifierConfig;
pub use error::ScheduleError;
pub use schedule::{ScheduleEntry, ScheduleSet};
