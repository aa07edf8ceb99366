//! Snapshot publishing to the presentation layer.
//!
//! Every mutation produces a full replacement snapshot (never a diff) that
//! is broadcast synchronously. [`SnapshotDiff`] is a helper for consumers
//! that want enter/exit cues.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use notiflow_core::types::{Entry, NotificationId};

// ─── Snapshot ────────────────────────────────────────────────────

/// Immutable ordered view of the registry at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Increments by one per publish; the initial empty snapshot is 0.
    pub version: u64,
    pub entries: Arc<[Entry]>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            entries: Arc::from(Vec::new()),
        }
    }

    pub fn ids(&self) -> Vec<NotificationId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn get(&self, id: NotificationId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Publisher ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct StatePublisher {
    current: Snapshot,
    tx: broadcast::Sender<Snapshot>,
}

impl StatePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            current: Snapshot::empty(),
            tx,
        }
    }

    /// Replace the current snapshot and broadcast it.
    pub fn publish(&mut self, entries: &[Entry]) -> &Snapshot {
        self.current = Snapshot {
            version: self.current.version + 1,
            entries: Arc::from(entries),
        };
        // No subscribers is fine; `current()` still serves late readers.
        let _ = self.tx.send(self.current.clone());
        &self.current
    }

    pub fn current(&self) -> Snapshot {
        self.current.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ─── Diff ────────────────────────────────────────────────────────

/// Id-level changes between two successive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Present in `next`, absent from `prev`. In `next` order.
    pub entered: Vec<NotificationId>,
    /// Closing in `next` but not in `prev` (including ones absent from `prev`).
    pub closing: Vec<NotificationId>,
    /// Present in `prev`, absent from `next`. In `prev` order.
    pub removed: Vec<NotificationId>,
}

impl SnapshotDiff {
    pub fn between(prev: &Snapshot, next: &Snapshot) -> Self {
        let prev_ids: HashSet<_> = prev.entries.iter().map(|e| e.id).collect();
        let next_ids: HashSet<_> = next.entries.iter().map(|e| e.id).collect();

        let entered = next
            .entries
            .iter()
            .filter(|e| !prev_ids.contains(&e.id))
            .map(|e| e.id)
            .collect();
        let closing = next
            .entries
            .iter()
            .filter(|e| e.closing && !prev.get(e.id).is_some_and(|p| p.closing))
            .map(|e| e.id)
            .collect();
        let removed = prev
            .entries
            .iter()
            .filter(|e| !next_ids.contains(&e.id))
            .map(|e| e.id)
            .collect();

        Self {
            entered,
            closing,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.closing.is_empty() && self.removed.is_empty()
    }
}
