/// Errors surfaced by the schedule set.
///
/// Only internal-consistency faults are errors here. Races the protocol
/// expects (a completion finding its notification already gone, an insert
/// while the identity is in flight) are resolved as no-ops by the callers
/// and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A notification identity was about to appear in both the idle and
    /// pending collections, or twice within one. Indicates a defect in the
    /// promotion/re-admission protocol; reported, never silently corrected.
    #[error("Schedule: notification '{0}' is already tracked")]
    DuplicateEntry(String),

    /// The two idle-side indexes disagree about an identity.
    #[error("Schedule: idle indexes out of sync for notification '{0}'")]
    IndexMismatch(String),
}
