//! Per-notification timers: auto-dismiss and removal grace period.
//!
//! Pure, deterministic deadline table. All time values are passed in as
//! milliseconds on the caller's monotonic clock; nothing here sleeps. The
//! runtime sleeps until [`TimerScheduler::next_deadline`] and then drains
//! [`TimerScheduler::take_expired`] on the same task that performs
//! cancellations, so a cancelled timer can never fire afterwards.

use std::collections::HashMap;

use notiflow_core::types::{Entry, ExpireTimeout, NotificationId};

// ─── Timer Kind ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Asks the source to dismiss the notification.
    AutoDismiss,
    /// Finalizes removal after the close animation.
    Removal,
}

/// A timer whose deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredTimer {
    pub id: NotificationId,
    pub kind: TimerKind,
    pub deadline_ms: u64,
}

// ─── Scheduler ───────────────────────────────────────────────────

/// Holds at most one auto-dismiss and one removal deadline per id.
#[derive(Debug, Clone)]
pub struct TimerScheduler {
    default_timeout_ms: u64,
    grace_period_ms: u64,
    auto_dismiss: HashMap<NotificationId, u64>,
    removal: HashMap<NotificationId, u64>,
}

impl TimerScheduler {
    pub fn new(default_timeout_ms: u64, grace_period_ms: u64) -> Self {
        Self {
            default_timeout_ms,
            grace_period_ms,
            auto_dismiss: HashMap::new(),
            removal: HashMap::new(),
        }
    }

    /// Schedule (or reschedule) the auto-dismiss timer for `entry`.
    ///
    /// Any existing auto-dismiss for the id is cleared first. Nothing is
    /// scheduled when the entry needs interaction (resident or has actions),
    /// is closing, or resolves to a zero timeout. Returns the deadline.
    pub fn schedule_auto_dismiss(&mut self, entry: &Entry, now_ms: u64) -> Option<u64> {
        self.cancel_auto_dismiss(entry.id);

        if entry.closing || entry.requires_interaction() {
            return None;
        }

        let timeout_ms = match entry.expire_timeout {
            ExpireTimeout::After(ms) => ms,
            ExpireTimeout::SourceDefault => self.default_timeout_ms,
        };
        // Zero means "already expired", not "dismiss now".
        if timeout_ms == 0 {
            return None;
        }

        let deadline = now_ms.saturating_add(timeout_ms);
        self.auto_dismiss.insert(entry.id, deadline);
        Some(deadline)
    }

    /// Schedule removal after the grace period, replacing any pending one.
    pub fn schedule_removal(&mut self, id: NotificationId, now_ms: u64) -> u64 {
        let deadline = now_ms.saturating_add(self.grace_period_ms);
        self.removal.insert(id, deadline);
        deadline
    }

    /// Idempotent. Returns whether a timer was pending.
    pub fn cancel_auto_dismiss(&mut self, id: NotificationId) -> bool {
        self.auto_dismiss.remove(&id).is_some()
    }

    /// Idempotent. Returns whether a timer was pending.
    pub fn cancel_removal(&mut self, id: NotificationId) -> bool {
        self.removal.remove(&id).is_some()
    }

    pub fn deadline(&self, id: NotificationId, kind: TimerKind) -> Option<u64> {
        self.table(kind).get(&id).copied()
    }

    pub fn is_pending(&self, id: NotificationId, kind: TimerKind) -> bool {
        self.table(kind).contains_key(&id)
    }

    /// Number of pending timers of both kinds.
    pub fn pending_count(&self) -> usize {
        self.auto_dismiss.len() + self.removal.len()
    }

    /// Earliest pending deadline across both kinds.
    pub fn next_deadline(&self) -> Option<u64> {
        self.auto_dismiss
            .values()
            .chain(self.removal.values())
            .copied()
            .min()
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    ///
    /// Ties are ordered by kind, then id, so draining is deterministic.
    pub fn take_expired(&mut self, now_ms: u64) -> Vec<ExpiredTimer> {
        let mut expired = Vec::new();
        for (kind, table) in [
            (TimerKind::AutoDismiss, &mut self.auto_dismiss),
            (TimerKind::Removal, &mut self.removal),
        ] {
            table.retain(|&id, &mut deadline_ms| {
                if deadline_ms <= now_ms {
                    expired.push(ExpiredTimer {
                        id,
                        kind,
                        deadline_ms,
                    });
                    false
                } else {
                    true
                }
            });
        }
        expired.sort_by_key(|t| (t.deadline_ms, t.kind, t.id));
        expired
    }

    fn table(&self, kind: TimerKind) -> &HashMap<NotificationId, u64> {
        match kind {
            TimerKind::AutoDismiss => &self.auto_dismiss,
            TimerKind::Removal => &self.removal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use notiflow_core::types::NotificationAction;

    fn scheduler() -> TimerScheduler {
        TimerScheduler::new(15_000, 850)
    }

    fn entry(id: u32) -> Entry {
        Entry {
            id: NotificationId(id),
            summary: "s".to_owned(),
            body: String::new(),
            app_name: String::new(),
            icon_name: "dialog-information-symbolic".to_owned(),
            actions: Vec::new(),
            time: DateTime::<Utc>::from_timestamp(0, 0).expect("valid ts"),
            closing: false,
            resident: false,
            expire_timeout: ExpireTimeout::SourceDefault,
        }
    }

    #[test]
    fn default_timeout_applies() {
        let mut t = scheduler();
        assert_eq!(t.schedule_auto_dismiss(&entry(1), 100), Some(15_100));
        assert!(t.is_pending(NotificationId(1), TimerKind::AutoDismiss));
    }

    #[test]
    fn explicit_timeout_applies() {
        let mut t = scheduler();
        let mut e = entry(1);
        e.expire_timeout = ExpireTimeout::After(4_000);
        assert_eq!(t.schedule_auto_dismiss(&e, 0), Some(4_000));
    }

    #[test]
    fn zero_timeout_schedules_nothing() {
        let mut t = scheduler();
        let mut e = entry(1);
        e.expire_timeout = ExpireTimeout::After(0);
        assert_eq!(t.schedule_auto_dismiss(&e, 0), None);
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn zero_default_timeout_schedules_nothing() {
        let mut t = TimerScheduler::new(0, 850);
        assert_eq!(t.schedule_auto_dismiss(&entry(1), 0), None);
    }

    #[test]
    fn resident_is_never_scheduled() {
        let mut t = scheduler();
        let mut e = entry(1);
        e.resident = true;
        assert_eq!(t.schedule_auto_dismiss(&e, 0), None);
        assert!(!t.is_pending(NotificationId(1), TimerKind::AutoDismiss));
    }

    #[test]
    fn actions_are_never_scheduled() {
        let mut t = scheduler();
        let mut e = entry(2);
        e.actions.push(NotificationAction {
            id: "a".to_owned(),
            label: "Open".to_owned(),
        });
        assert_eq!(t.schedule_auto_dismiss(&e, 0), None);
    }

    #[test]
    fn closing_entry_is_never_scheduled() {
        let mut t = scheduler();
        let mut e = entry(2);
        e.closing = true;
        assert_eq!(t.schedule_auto_dismiss(&e, 0), None);
    }

    #[test]
    fn reschedule_replaces_previous_deadline() {
        let mut t = scheduler();
        t.schedule_auto_dismiss(&entry(3), 0);
        t.schedule_auto_dismiss(&entry(3), 5_000);
        assert_eq!(t.deadline(NotificationId(3), TimerKind::AutoDismiss), Some(20_000));
        assert_eq!(t.pending_count(), 1);
    }

    #[test]
    fn reschedule_to_suppressed_clears_previous() {
        let mut t = scheduler();
        t.schedule_auto_dismiss(&entry(3), 0);
        let mut resident = entry(3);
        resident.resident = true;
        t.schedule_auto_dismiss(&resident, 10);
        assert!(!t.is_pending(NotificationId(3), TimerKind::AutoDismiss));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut t = scheduler();
        assert!(!t.cancel_auto_dismiss(NotificationId(9)));
        assert!(!t.cancel_removal(NotificationId(9)));

        t.schedule_removal(NotificationId(9), 0);
        assert!(t.cancel_removal(NotificationId(9)));
        assert!(!t.cancel_removal(NotificationId(9)));
    }

    #[test]
    fn kinds_are_independent() {
        let mut t = scheduler();
        t.schedule_auto_dismiss(&entry(1), 0);
        t.schedule_removal(NotificationId(1), 0);
        t.cancel_removal(NotificationId(1));
        assert!(t.is_pending(NotificationId(1), TimerKind::AutoDismiss));
        assert!(!t.is_pending(NotificationId(1), TimerKind::Removal));
    }

    #[test]
    fn removal_fires_exactly_at_grace() {
        let mut t = scheduler();
        assert_eq!(t.schedule_removal(NotificationId(4), 1_000), 1_850);
        assert!(t.take_expired(1_849).is_empty());

        let fired = t.take_expired(1_850);
        assert_eq!(
            fired,
            [ExpiredTimer {
                id: NotificationId(4),
                kind: TimerKind::Removal,
                deadline_ms: 1_850,
            }]
        );
        assert!(t.take_expired(5_000).is_empty());
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut t = scheduler();
        assert_eq!(t.next_deadline(), None);
        t.schedule_auto_dismiss(&entry(1), 0);
        t.schedule_removal(NotificationId(2), 0);
        assert_eq!(t.next_deadline(), Some(850));
        t.cancel_removal(NotificationId(2));
        assert_eq!(t.next_deadline(), Some(15_000));
    }

    #[test]
    fn take_expired_orders_by_deadline() {
        let mut t = scheduler();
        let mut short = entry(1);
        short.expire_timeout = ExpireTimeout::After(900);
        t.schedule_auto_dismiss(&short, 0);
        t.schedule_removal(NotificationId(2), 0);

        let fired = t.take_expired(1_000);
        let order: Vec<_> = fired.iter().map(|f| (f.id.get(), f.kind)).collect();
        assert_eq!(order, [(2, TimerKind::Removal), (1, TimerKind::AutoDismiss)]);
        assert_eq!(t.pending_count(), 0);
    }
}
