use crate::config::NotifierConfig;
use crate::decision::{classify, should_notify};
use crate::schedule::{ScheduleEntry, ScheduleSet};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use vigil_common::types::{CheckResult, NotificationType, StateType};
use vigil_model::{CheckEvent, Checkable, Notification};

/// Idle/pending gauges for one component instance, aggregable by name into
/// a status document.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub component: String,
    pub idle: usize,
    pub pending: usize,
}

/// Everything the scheduler loop, the ingestion path, and the dispatch
/// completions share: the schedule set behind one mutex, the wake condition,
/// and the shutdown flag.
struct SchedulerShared {
    schedules: Mutex<ScheduleSet>,
    wake: Notify,
    stopped: AtomicBool,
}

impl SchedulerShared {
    fn lock_schedules(&self) -> MutexGuard<'_, ScheduleSet> {
        self.schedules.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// What the scheduler loop decided to do after one look at the set.
enum Step {
    /// Hand the promoted entry to a dispatch task.
    Dispatch(ScheduleEntry),
    /// Idle is empty; park until something is inserted.
    WaitEmpty,
    /// The earliest entry has not matured; park at most this long.
    WaitUntil(Duration),
    /// An inconsistency was reported; re-examine the set immediately.
    Resume,
}

/// The notification-scheduling component.
///
/// Subscribes to state-change and flapping events, fires immediate sends
/// for notification-worthy transitions, and keeps repeatable notifications
/// on a reminder schedule until they resolve or are disabled.
///
/// One dedicated scheduler task owns the schedule set; ingestion and
/// dispatch-completion paths touch it only under the shared mutex and wake
/// the task through the notify handle. No delivery ever happens while the
/// mutex is held.
pub struct NotificationComponent {
    name: String,
    shared: Arc<SchedulerShared>,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationComponent {
    pub fn new(config: NotifierConfig) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            name: config.component_name,
            shared: Arc::new(SchedulerShared {
                schedules: Mutex::new(ScheduleSet::new()),
                wake: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
            stop_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns the scheduler loop and the event listener.
    pub fn start(self: &Arc<Self>, events: broadcast::Receiver<CheckEvent>) {
        tracing::info!(component = %self.name, "Notification component started");

        let scheduler = tokio::spawn(self.clone().run_scheduler());
        let listener = tokio::spawn(self.clone().run_listener(events));

        self.tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend([scheduler, listener]);
    }

    /// Requests shutdown and waits for both tasks to exit. Entries still in
    /// the set are dropped without firing; dispatches already in flight run
    /// to completion but no longer re-admit anything.
    pub async fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        let _ = self.stop_tx.send(true);

        let handles: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(component = %self.name, error = %e, "Component task failed");
            }
        }

        tracing::info!(component = %self.name, "Notification component stopped");
    }

    // ---- Event ingestion ----

    async fn run_listener(self: Arc<Self>, mut events: broadcast::Receiver<CheckEvent>) {
        let mut stop_rx = self.stop_tx.subscribe();
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                event = events.recv() => match event {
                    Ok(CheckEvent::StateChange { checkable, result, state_type }) => {
                        self.on_state_change(&checkable, &result, state_type);
                    }
                    Ok(CheckEvent::FlappingChanged { checkable }) => {
                        self.on_flapping_changed(&checkable);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(component = %self.name, skipped, "Check event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Reacts to a state change: fires immediate sends for every attached
    /// notification and schedules reminders for problem transitions.
    pub fn on_state_change(
        &self,
        checkable: &Arc<Checkable>,
        result: &CheckResult,
        state_type: StateType,
    ) {
        if state_type != StateType::Hard {
            tracing::debug!(
                component = %self.name,
                checkable = checkable.name(),
                "Ignoring soft state change"
            );
            return;
        }

        if !should_notify(
            checkable,
            checkable.last_state(),
            checkable.last_state_type(),
            result.state,
            state_type,
        ) {
            tracing::debug!(
                component = %self.name,
                checkable = checkable.name(),
                state = %result.state,
                "State change suppressed"
            );
            return;
        }

        let ntype = classify(result.state);

        for notification in checkable.notifications() {
            tracing::debug!(
                component = %self.name,
                checkable = checkable.name(),
                notification = notification.name(),
                notification_type = %ntype,
                "Hard state change fires notification"
            );

            self.fire(&notification, ntype, Some(result.clone()));

            if ntype.repeats() {
                self.schedule_reminder(&notification);
            }
        }
    }

    /// Reacts to a flapping flag flip: flapping-start notifications repeat
    /// as reminders until the flap resolves, flapping-end is terminal.
    pub fn on_flapping_changed(&self, checkable: &Arc<Checkable>) {
        let ntype = if checkable.is_flapping() {
            NotificationType::FlappingStart
        } else {
            NotificationType::FlappingEnd
        };

        for notification in checkable.notifications() {
            tracing::debug!(
                component = %self.name,
                checkable = checkable.name(),
                notification = notification.name(),
                notification_type = %ntype,
                "Flapping change fires notification"
            );

            self.fire(&notification, ntype, checkable.last_check_result());

            if ntype.repeats() {
                self.schedule_reminder(&notification);
            }
        }
    }

    /// Immediate asynchronous send, off the scheduler lock.
    fn fire(
        &self,
        notification: &Arc<Notification>,
        ntype: NotificationType,
        check_result: Option<CheckResult>,
    ) {
        let notification = notification.clone();
        let component = self.name.clone();
        tokio::spawn(async move {
            if let Err(e) = notification.execute(ntype, check_result, false, false).await {
                tracing::warn!(
                    component = %component,
                    notification = notification.name(),
                    error = %e,
                    "Notification delivery failed"
                );
            }
        });
    }

    /// Admits the notification into the idle set at its own next-due time
    /// and wakes the scheduler. A no-op while the identity is in flight.
    fn schedule_reminder(&self, notification: &Arc<Notification>) {
        let entry = ScheduleEntry::snapshot(notification);
        let refreshed = {
            let mut schedules = self.shared.lock_schedules();
            schedules.refresh_idle(entry)
        };

        match refreshed {
            Ok(true) => self.shared.wake.notify_one(),
            Ok(false) => {
                // in flight; dispatch completion re-admits with a fresh snapshot
            }
            Err(e) => {
                tracing::error!(
                    component = %self.name,
                    notification = notification.name(),
                    error = %e,
                    "Schedule set inconsistency while admitting reminder"
                );
            }
        }
    }

    // ---- Scheduler loop ----

    async fn run_scheduler(self: Arc<Self>) {
        tracing::debug!(component = %self.name, "Notification scheduler running");

        loop {
            let step = {
                let mut schedules = self.shared.lock_schedules();
                if self.shared.is_stopped() {
                    break;
                }

                let now = Utc::now();
                match schedules.promote_due(now) {
                    Ok(Some(entry)) => Step::Dispatch(entry),
                    Ok(None) => match schedules.next_due() {
                        None => Step::WaitEmpty,
                        Some(due) => {
                            Step::WaitUntil((due - now).to_std().unwrap_or(Duration::ZERO))
                        }
                    },
                    Err(e) => {
                        tracing::error!(
                            component = %self.name,
                            error = %e,
                            "Schedule set inconsistency, entry dropped"
                        );
                        Step::Resume
                    }
                }
            };

            match step {
                Step::Dispatch(entry) => {
                    tracing::debug!(
                        component = %self.name,
                        notification = entry.notification.name(),
                        due_at = %entry.due_at,
                        "Dispatching reminder"
                    );
                    tokio::spawn(self.clone().send_reminder(entry));
                }
                Step::WaitEmpty => {
                    // notify_one stores a permit, so an insert landing between
                    // the unlock above and this await is not lost
                    self.shared.wake.notified().await;
                }
                Step::WaitUntil(timeout) => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = tokio::time::sleep(timeout) => {}
                    }
                    // whether woken by the timeout or by an insert, the next
                    // iteration re-validates against the current minimum
                }
                Step::Resume => {}
            }
        }

        tracing::debug!(component = %self.name, "Notification scheduler exited");
    }

    // ---- Dispatch completion ----

    /// Executes the reminder send and then re-admits the notification if it
    /// is still active. Runs on its own task; a failed send still reaches
    /// the re-admission step.
    async fn send_reminder(self: Arc<Self>, entry: ScheduleEntry) {
        let notification = entry.notification;
        let check_result = notification
            .checkable()
            .and_then(|checkable| checkable.last_check_result());

        if let Err(e) = notification
            .execute(NotificationType::Problem, check_result, false, true)
            .await
        {
            tracing::warn!(
                component = %self.name,
                notification = notification.name(),
                error = %e,
                "Reminder delivery failed"
            );
        }

        let mut schedules = self.shared.lock_schedules();
        if self.shared.is_stopped() {
            return;
        }

        if schedules.complete(notification.id()).is_none() {
            // concurrently removed; nothing to re-admit
            return;
        }

        if notification.is_active() {
            if let Err(e) = schedules.readmit(ScheduleEntry::snapshot(&notification)) {
                tracing::error!(
                    component = %self.name,
                    notification = notification.name(),
                    error = %e,
                    "Schedule set inconsistency while re-admitting"
                );
            }
        } else {
            tracing::debug!(
                component = %self.name,
                notification = notification.name(),
                "Notification no longer active, dropping from schedule"
            );
        }

        drop(schedules);
        self.shared.wake.notify_one();
    }

    // ---- Status reporting ----

    pub fn idle_count(&self) -> usize {
        self.shared.lock_schedules().idle_len()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock_schedules().pending_len()
    }

    pub fn status(&self) -> SchedulerStatus {
        let schedules = self.shared.lock_schedules();
        SchedulerStatus {
            component: self.name.clone(),
            idle: schedules.idle_len(),
            pending: schedules.pending_len(),
        }
    }
}
