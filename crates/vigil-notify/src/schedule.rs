use crate::error::ScheduleError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vigil_model::Notification;

/// Read-time snapshot of a notification's due time.
///
/// Always derived via [`ScheduleEntry::snapshot`]; never mutated. When a
/// notification is re-admitted after a send, a fresh snapshot picks up the
/// due time the notification recomputed for itself.
#[derive(Clone)]
pub struct ScheduleEntry {
    pub notification: Arc<Notification>,
    pub due_at: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn snapshot(notification: &Arc<Notification>) -> Self {
        Self {
            notification: notification.clone(),
            due_at: notification.next_notification_time(),
        }
    }
}

impl std::fmt::Debug for ScheduleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleEntry")
            .field("notification", &self.notification.name())
            .field("due_at", &self.due_at)
            .finish()
    }
}

/// The scheduler's working set: idle entries awaiting their due time, and
/// pending entries currently in flight to the dispatch path.
///
/// The idle side is dual-indexed: an identity map for O(log n) stale-entry
/// replacement, and an ordered `(due_at, id)` map so the minimum is always
/// at the front without a scan. The id tie-break keeps dispatch order
/// deterministic for equal due times.
///
/// Invariant: a notification identity lives in at most one of
/// {idle, pending}, and at most once there.
#[derive(Default)]
pub struct ScheduleSet {
    idle_by_id: HashMap<String, DateTime<Utc>>,
    idle_by_due: BTreeMap<(DateTime<Utc>, String), ScheduleEntry>,
    pending: HashMap<String, ScheduleEntry>,
}

impl ScheduleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits (or refreshes) an idle entry for the entry's notification,
    /// replacing any stale entry for the same identity.
    ///
    /// Returns `Ok(false)` without inserting when the identity is currently
    /// pending: the in-flight completion will re-admit it with a fresh
    /// snapshot, and inserting here would violate mutual exclusion.
    pub fn refresh_idle(&mut self, entry: ScheduleEntry) -> Result<bool, ScheduleError> {
        let id = entry.notification.id().to_string();

        if self.pending.contains_key(&id) {
            return Ok(false);
        }

        if let Some(stale_due) = self.idle_by_id.remove(&id) {
            if self.idle_by_due.remove(&(stale_due, id.clone())).is_none() {
                return Err(ScheduleError::IndexMismatch(id));
            }
        }

        self.idle_by_id.insert(id.clone(), entry.due_at);
        self.idle_by_due.insert((entry.due_at, id), entry);
        Ok(true)
    }

    /// Due time of the earliest idle entry, if any.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.idle_by_due.keys().next().map(|(due, _)| *due)
    }

    /// Moves the earliest idle entry to pending, provided it is actually due
    /// (`due_at <= now`). Returns `Ok(None)` when idle is empty or the
    /// minimum has not matured yet.
    pub fn promote_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduleEntry>, ScheduleError> {
        let due = match self.next_due() {
            Some(due) if due <= now => due,
            _ => return Ok(None),
        };

        let Some(((_, id), entry)) = self.idle_by_due.pop_first() else {
            return Ok(None);
        };
        debug_assert_eq!(entry.due_at, due);

        if self.idle_by_id.remove(&id).is_none() {
            return Err(ScheduleError::IndexMismatch(id));
        }
        if self.pending.contains_key(&id) {
            // entry stays out of both collections; the caller reports this
            return Err(ScheduleError::DuplicateEntry(id));
        }

        self.pending.insert(id, entry.clone());
        Ok(Some(entry))
    }

    /// Removes a completed dispatch from pending. `None` means the identity
    /// was concurrently removed, which the protocol treats as a benign race.
    pub fn complete(&mut self, id: &str) -> Option<ScheduleEntry> {
        self.pending.remove(id)
    }

    /// Re-admits a notification into idle after its dispatch completed.
    /// The identity must not be tracked anywhere at this point.
    pub fn readmit(&mut self, entry: ScheduleEntry) -> Result<(), ScheduleError> {
        let id = entry.notification.id().to_string();
        if self.idle_by_id.contains_key(&id) || self.pending.contains_key(&id) {
            return Err(ScheduleError::DuplicateEntry(id));
        }
        self.idle_by_id.insert(id.clone(), entry.due_at);
        self.idle_by_due.insert((entry.due_at, id), entry);
        Ok(())
    }

    pub fn idle_len(&self) -> usize {
        self.idle_by_due.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
