use vigil_common::types::{DependencyKind, NotificationType, ServiceState, StateType};
use vigil_model::Checkable;

/// Decides whether a hard state transition on `checkable` warrants a
/// problem/recovery notification.
///
/// Pure predicate: reads the checkable's suppression flags, takes no locks
/// beyond the checkable's own accessors, and has no side effects. Flapping
/// transitions are handled by a separate path and are therefore suppressed
/// here outright.
///
/// Rule order matters; later rules override earlier ones:
/// 1. unreachable, in downtime, or acknowledged: never notify
/// 2. flapping: never notify
/// 3. a soft-to-hard transition notifies, unless it is soft-OK to hard-OK
/// 4. a volatile checkable in a hard state notifies, except volatile OK-to-OK
/// 5. OK-to-OK never notifies, regardless of the above
pub fn should_notify(
    checkable: &Checkable,
    last_state: ServiceState,
    last_state_type: StateType,
    state: ServiceState,
    state_type: StateType,
) -> bool {
    if !checkable.is_reachable(DependencyKind::Notification)
        || checkable.is_in_downtime()
        || checkable.is_acknowledged()
    {
        return false;
    }

    if checkable.is_flapping() {
        return false;
    }

    let ok_to_ok = last_state.is_ok() && state.is_ok();
    let mut notify = false;

    if last_state_type == StateType::Soft && state_type == StateType::Hard && !ok_to_ok {
        notify = true;
    }

    if checkable.is_volatile() && state_type == StateType::Hard {
        notify = !ok_to_ok;
    }

    if ok_to_ok {
        notify = false;
    }

    notify
}

/// Classifies a firing state change: a checkable back in the OK state sends
/// a recovery, everything else is a problem.
pub fn classify(state: ServiceState) -> NotificationType {
    if state.is_ok() {
        NotificationType::Recovery
    } else {
        NotificationType::Problem
    }
}
