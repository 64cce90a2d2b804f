use crate::notification::Notification;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use vigil_common::types::{CheckResult, DependencyKind, ServiceState, StateType};

/// A monitored entity (host or service) with a soft/hard state machine.
///
/// The state machine itself is driven by an external check runtime; the
/// scheduling engine only reads it. All accessors take snapshots under a
/// read lock and never block for long.
pub struct Checkable {
    id: String,
    name: String,
    volatile: bool,
    state: RwLock<CheckableState>,
    notifications: RwLock<Vec<Arc<Notification>>>,
}

#[derive(Debug, Clone)]
struct CheckableState {
    state: ServiceState,
    state_type: StateType,
    last_state: ServiceState,
    last_state_type: StateType,
    last_check_result: Option<CheckResult>,
    reachable: bool,
    in_downtime: bool,
    acknowledged: bool,
    flapping: bool,
}

impl Checkable {
    /// Creates a checkable in the pristine hard-OK state, reachable and
    /// without any suppression flags set.
    pub fn new(name: impl Into<String>, volatile: bool) -> Arc<Self> {
        Arc::new(Self {
            id: vigil_common::id::next_id(),
            name: name.into(),
            volatile,
            state: RwLock::new(CheckableState {
                state: ServiceState::Ok,
                state_type: StateType::Hard,
                last_state: ServiceState::Ok,
                last_state_type: StateType::Hard,
                last_check_result: None,
                reachable: true,
                in_downtime: false,
                acknowledged: false,
                flapping: false,
            }),
            notifications: RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    fn read(&self) -> RwLockReadGuard<'_, CheckableState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn state(&self) -> ServiceState {
        self.read().state
    }

    pub fn state_type(&self) -> StateType {
        self.read().state_type
    }

    pub fn last_state(&self) -> ServiceState {
        self.read().last_state
    }

    pub fn last_state_type(&self) -> StateType {
        self.read().last_state_type
    }

    pub fn last_check_result(&self) -> Option<CheckResult> {
        self.read().last_check_result.clone()
    }

    /// Reachability with respect to the given dependency graph. A checkable
    /// whose notification dependencies are failed must not page anyone.
    pub fn is_reachable(&self, kind: DependencyKind) -> bool {
        let state = self.read();
        match kind {
            DependencyKind::CheckExecution | DependencyKind::Notification => state.reachable,
        }
    }

    pub fn is_in_downtime(&self) -> bool {
        self.read().in_downtime
    }

    pub fn is_acknowledged(&self) -> bool {
        self.read().acknowledged
    }

    pub fn is_flapping(&self) -> bool {
        self.read().flapping
    }

    /// Notifications attached to this checkable. Iteration order is not
    /// significant.
    pub fn notifications(&self) -> Vec<Arc<Notification>> {
        self.notifications
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn add_notification(&self, notification: Arc<Notification>) {
        self.notifications
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(notification);
    }

    // ---- Mutators used by the external check runtime ----

    /// Records the outcome of a check execution, shifting the current
    /// state/state-type into the `last_*` slots.
    pub fn apply_check_result(&self, result: CheckResult, state_type: StateType) {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        state.last_state = state.state;
        state.last_state_type = state.state_type;
        state.state = result.state;
        state.state_type = state_type;
        state.last_check_result = Some(result);
    }

    /// Updates the flapping flag. Returns true if the flag actually changed.
    pub fn set_flapping(&self, flapping: bool) -> bool {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        let changed = state.flapping != flapping;
        state.flapping = flapping;
        changed
    }

    pub fn set_in_downtime(&self, in_downtime: bool) {
        self.state
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .in_downtime = in_downtime;
    }

    pub fn set_acknowledged(&self, acknowledged: bool) {
        self.state
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .acknowledged = acknowledged;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .reachable = reachable;
    }
}

impl std::fmt::Debug for Checkable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("volatile", &self.volatile)
            .finish_non_exhaustive()
    }
}
