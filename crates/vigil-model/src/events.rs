use crate::checkable::Checkable;
use std::sync::Arc;
use tokio::sync::broadcast;
use vigil_common::types::{CheckResult, StateType};

/// A signal emitted by the check runtime when something observable happened
/// to a checkable.
#[derive(Debug, Clone)]
pub enum CheckEvent {
    /// The checkable transitioned to a new state. Carries the triggering
    /// check result and the confirmation level of the new state.
    StateChange {
        checkable: Arc<Checkable>,
        result: CheckResult,
        state_type: StateType,
    },
    /// The checkable started or stopped flapping. Subscribers read the
    /// current flag from the checkable itself.
    FlappingChanged { checkable: Arc<Checkable> },
}

/// Fan-out bus for check events. Any number of components may subscribe;
/// publishing never blocks.
pub struct EventBus {
    tx: broadcast::Sender<CheckEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: CheckEvent) {
        // send only fails when nobody is subscribed, which is fine
        if self.tx.send(event).is_err() {
            tracing::debug!("Check event dropped, no subscribers");
        }
    }

    /// Records the result on the checkable and publishes the corresponding
    /// state-change event.
    pub fn publish_state_change(
        &self,
        checkable: &Arc<Checkable>,
        result: CheckResult,
        state_type: StateType,
    ) {
        checkable.apply_check_result(result.clone(), state_type);
        self.publish(CheckEvent::StateChange {
            checkable: checkable.clone(),
            result,
            state_type,
        });
    }

    /// Updates the flapping flag and publishes a flapping-changed event if
    /// the flag actually flipped.
    pub fn publish_flapping_changed(&self, checkable: &Arc<Checkable>, flapping: bool) {
        if checkable.set_flapping(flapping) {
            self.publish(CheckEvent::FlappingChanged {
                checkable: checkable.clone(),
            });
        }
    }
}
