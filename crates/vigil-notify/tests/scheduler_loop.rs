//! End-to-end tests of the scheduler loop: event ingestion through the bus,
//! immediate sends, reminder repetition, and shutdown. These run against the
//! real clock with short intervals and generous assertion margins.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_common::types::{CheckResult, NotificationType, ServiceState, StateType};
use vigil_model::{Checkable, DeliveryChannel, EventBus, Notification, NotificationMessage};
use vigil_notify::{NotificationComponent, NotifierConfig};

struct RecordingChannel {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl RecordingChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn reminders(&self) -> usize {
        self.sent.lock().unwrap().iter().filter(|m| m.reminder).count()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

struct FailingChannel;

#[async_trait]
impl DeliveryChannel for FailingChannel {
    async fn send(&self, _message: &NotificationMessage) -> Result<()> {
        anyhow::bail!("gateway unavailable")
    }

    fn channel_name(&self) -> &str {
        "failing"
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn component() -> Arc<NotificationComponent> {
    NotificationComponent::new(NotifierConfig::default())
}

/// Polls `pred` every 10ms until it holds or `timeout` elapses.
async fn wait_for(pred: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if pred() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pred()
}

fn critical() -> CheckResult {
    CheckResult::new(ServiceState::Critical, "CRITICAL - connection refused")
}

fn ok() -> CheckResult {
    CheckResult::new(ServiceState::Ok, "OK")
}

#[tokio::test(flavor = "multi_thread")]
async fn hard_problem_fires_immediately_and_repeats_as_reminder() {
    init_tracing();
    let bus = EventBus::new(NotifierConfig::default().event_buffer);
    let checkable = Checkable::new("web-01", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Hard);

    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);
    let first = &channel.sent()[0];
    assert_eq!(first.notification_type, NotificationType::Problem);
    assert!(!first.reminder);
    assert_eq!(comp.idle_count(), 1);

    // the reminder schedule keeps firing until the problem resolves
    assert!(wait_for(|| channel.reminders() >= 2, Duration::from_secs(3)).await);
    assert!(channel
        .sent()
        .iter()
        .filter(|m| m.reminder)
        .all(|m| m.notification_type == NotificationType::Problem));

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_fires_but_is_never_scheduled() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-02", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    // soft problem first (ignored), then a hard recovery
    bus.publish_state_change(&checkable, critical(), StateType::Soft);
    bus.publish_state_change(&checkable, ok(), StateType::Hard);

    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].notification_type, NotificationType::Recovery);
    assert_eq!(comp.idle_count(), 0);
    assert_eq!(comp.pending_count(), 0);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_state_changes_are_ignored() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-03", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Soft);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(channel.count(), 0);
    assert_eq!(comp.idle_count(), 0);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn earlier_due_entry_preempts_a_parked_wait() {
    init_tracing();
    let bus = EventBus::new(256);

    let slow = Checkable::new("slow-01", false);
    let slow_channel = RecordingChannel::new();
    Notification::new(
        "slow-reminder",
        &slow,
        slow_channel.clone(),
        Duration::from_millis(900),
    );

    let fast = Checkable::new("fast-01", false);
    let fast_channel = RecordingChannel::new();
    Notification::new(
        "fast-reminder",
        &fast,
        fast_channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    // the loop parks on the slow entry's due time first
    bus.publish_state_change(&slow, critical(), StateType::Hard);
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus.publish_state_change(&fast, critical(), StateType::Hard);

    // the fast reminder lands while the slow one is still parked
    assert!(wait_for(|| fast_channel.reminders() >= 1, Duration::from_secs(2)).await);
    assert_eq!(slow_channel.reminders(), 0, "slow reminder fired early");

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_into_empty_idle_wakes_the_loop() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-04", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(100),
    );

    let comp = component();
    comp.start(bus.subscribe());

    // let the loop park on an empty idle set first
    tokio::time::sleep(Duration::from_millis(200)).await;
    bus.publish_state_change(&checkable, critical(), StateType::Hard);

    assert!(wait_for(|| channel.reminders() >= 1, Duration::from_secs(2)).await);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn flapping_start_repeats_flapping_end_is_terminal() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-05", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_flapping_changed(&checkable, true);

    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);
    assert_eq!(
        channel.sent()[0].notification_type,
        NotificationType::FlappingStart
    );
    assert_eq!(comp.idle_count(), 1);

    comp.stop().await;

    // a fresh component seeing only the end of a flap schedules nothing
    let checkable = Checkable::new("web-06", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );
    checkable.set_flapping(true);

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_flapping_changed(&checkable, false);

    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);
    assert_eq!(
        channel.sent()[0].notification_type,
        NotificationType::FlappingEnd
    );
    assert_eq!(comp.idle_count(), 0);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn deactivated_notification_is_dropped_at_completion() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-07", false);
    let channel = RecordingChannel::new();
    let notification = Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Hard);
    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);
    assert_eq!(comp.idle_count(), 1);

    // disabled while idle: the next promotion skips delivery and the
    // completion drops the identity from the set entirely
    notification.set_active(false);

    assert!(
        wait_for(
            || comp.idle_count() == 0 && comp.pending_count() == 0,
            Duration::from_secs(2),
        )
        .await
    );
    assert_eq!(channel.count(), 1, "inactive notification still delivered");

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_reminder_delivery_keeps_the_schedule_alive() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-08", false);
    let notification = Notification::new(
        "mail-oncall",
        &checkable,
        Arc::new(FailingChannel),
        Duration::from_millis(150),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Hard);

    // several attempts happen despite every delivery failing
    assert!(wait_for(|| notification.sent_count() >= 3, Duration::from_secs(3)).await);
    assert_eq!(comp.idle_count() + comp.pending_count(), 1);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_joins_the_loop_and_halts_processing() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-09", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_millis(100),
    );

    let comp = component();
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Hard);
    assert!(wait_for(|| channel.count() >= 1, Duration::from_secs(2)).await);

    comp.stop().await;
    let after_stop = channel.count();

    // no further promotions, and new events are no longer ingested
    tokio::time::sleep(Duration::from_millis(400)).await;
    bus.publish_state_change(&checkable, critical(), StateType::Hard);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(channel.count(), after_stop);

    // stop is idempotent
    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn volatile_repeat_events_keep_a_single_idle_entry() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-10", true);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_secs(60),
    );

    let comp = component();
    comp.start(bus.subscribe());

    // a volatile checkable notifies on every hard problem check
    bus.publish_state_change(&checkable, critical(), StateType::Hard);
    bus.publish_state_change(&checkable, critical(), StateType::Hard);

    assert!(wait_for(|| channel.count() >= 2, Duration::from_secs(2)).await);
    assert_eq!(comp.idle_count(), 1);
    assert_eq!(comp.pending_count(), 0);

    comp.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn status_document_reports_gauges_by_instance_name() {
    init_tracing();
    let bus = EventBus::new(256);
    let checkable = Checkable::new("web-11", false);
    let channel = RecordingChannel::new();
    Notification::new(
        "page-oncall",
        &checkable,
        channel.clone(),
        Duration::from_secs(60),
    );

    let comp = NotificationComponent::new(NotifierConfig {
        component_name: "notification-primary".into(),
        ..NotifierConfig::default()
    });
    comp.start(bus.subscribe());

    bus.publish_state_change(&checkable, critical(), StateType::Hard);
    assert!(wait_for(|| comp.idle_count() == 1, Duration::from_secs(2)).await);

    let status = serde_json::to_value(comp.status()).unwrap();
    assert_eq!(status["component"], "notification-primary");
    assert_eq!(status["idle"], 1);
    assert_eq!(status["pending"], 0);

    comp.stop().await;
}
