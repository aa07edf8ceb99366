//! Registry of live notifications.
//!
//! Holds at most one entry per id, kept sorted by `time` descending. Only the
//! engine mutates it; timer side effects live in [`crate::timers`].

use notiflow_core::types::{Entry, NotificationId};

/// Outcome of a closing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTransition {
    /// No entry with this id.
    Missing,
    /// Entry was already closing; nothing changed.
    AlreadyClosing,
    /// Entry moved from Active to Closing.
    Closing,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `entry.id` and re-sort.
    ///
    /// The replacement always starts Active. Among equal timestamps the
    /// newest upsert comes first.
    pub fn upsert(&mut self, mut entry: Entry) {
        entry.closing = false;
        self.entries.retain(|existing| existing.id != entry.id);
        self.entries.insert(0, entry);
        // Stable sort keeps the just-inserted entry ahead of equal times.
        self.entries.sort_by(|a, b| b.time.cmp(&a.time));
    }

    /// Flag the entry as closing. Order is left as is.
    pub fn mark_closing(&mut self, id: NotificationId) -> CloseTransition {
        match self.entries.iter_mut().find(|e| e.id == id) {
            None => CloseTransition::Missing,
            Some(entry) if entry.closing => CloseTransition::AlreadyClosing,
            Some(entry) => {
                entry.closing = true;
                CloseTransition::Closing
            }
        }
    }

    /// Delete the entry. Returns whether anything was removed.
    pub fn delete(&mut self, id: NotificationId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: NotificationId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.get(id).is_some()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
