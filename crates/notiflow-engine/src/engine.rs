//! Notification lifecycle engine.
//!
//! Owns the registry, both timer tables, and the publisher. Each notification
//! moves Active → Closing → Removed:
//!
//! ```text
//!   ∅       ── notified ──────────▶ Active
//!   Active  ── notified ──────────▶ Active   (timers cancelled + rescheduled)
//!   Active  ── resolved ──────────▶ Closing  (publish; removal after grace)
//!   Closing ── notified ──────────▶ Active   (pending removal cancelled)
//!   Closing ── removal timer ─────▶ ∅
//!   resolved on unknown id        ─▶ no-op
//! ```
//!
//! The engine never sleeps or blocks. The caller passes its monotonic clock as
//! `now_ms` and calls [`Engine::fire_due`] when [`Engine::next_deadline`] is
//! reached. All methods take `&mut self`, so one owner serializes every
//! mutation.

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use notiflow_core::config::EngineConfig;
use notiflow_core::ingest;
use notiflow_core::types::{Entry, NotifError, NotificationId};

use crate::publisher::{Snapshot, StatePublisher};
use crate::registry::{CloseTransition, Registry};
use crate::source::NotificationSource;
use crate::timers::{TimerKind, TimerScheduler};

pub struct Engine<S> {
    source: S,
    config: EngineConfig,
    registry: Registry,
    timers: TimerScheduler,
    publisher: StatePublisher,
}

impl<S: NotificationSource> Engine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let timers = TimerScheduler::new(config.default_timeout_ms, config.grace_period_ms);
        let publisher = StatePublisher::new(config.snapshot_capacity());
        Self {
            source,
            config,
            registry: Registry::new(),
            timers,
            publisher,
        }
    }

    /// Load notifications that were live before the engine started.
    ///
    /// Returns the number of entries accepted.
    pub fn bootstrap(&mut self, now_ms: u64) -> usize {
        let mut accepted = 0;
        for record in self.source.list_unresolved() {
            let Some(id) = record.id.and_then(NotificationId::from_raw) else {
                warn!(raw_id = ?record.id, "skipping unresolved record without valid id");
                continue;
            };
            match ingest::normalize(id, &record, &self.config, Utc::now()) {
                Ok(entry) => {
                    self.upsert(entry, now_ms);
                    accepted += 1;
                }
                Err(err) => warn!(id = %id, error = %err, "skipping unresolved record"),
            }
        }
        info!(accepted, "bootstrap complete");
        accepted
    }

    // ─── Source Events ───────────────────────────────────────────

    /// Handle a "notified" event from the source.
    ///
    /// Invalid ids, vanished records, and malformed records are dropped here
    /// without touching state.
    pub fn on_notified(&mut self, raw_id: i64, now_ms: u64) {
        match self.ingest(raw_id) {
            Ok(entry) => self.upsert(entry, now_ms),
            Err(NotifError::NotFound(id)) => {
                debug!(id = %id, "notified record no longer available, dropping");
            }
            Err(err) => warn!(raw_id, error = %err, "dropping notified event"),
        }
    }

    /// Handle a "resolved" event from the source.
    pub fn on_resolved(&mut self, raw_id: i64, now_ms: u64) {
        match NotificationId::from_raw(raw_id) {
            Some(id) => self.remove(id, now_ms),
            None => debug!(raw_id, "resolved event with invalid id ignored"),
        }
    }

    fn ingest(&self, raw_id: i64) -> Result<Entry, NotifError> {
        let id = NotificationId::from_raw(raw_id)
            .ok_or_else(|| NotifError::MalformedRecord(format!("invalid id {raw_id}")))?;
        let record = self.source.get_by_id(id).ok_or(NotifError::NotFound(id))?;
        ingest::normalize(id, &record, &self.config, Utc::now())
    }

    // ─── Registry Transitions ────────────────────────────────────

    /// Insert or replace an entry, publish, and (re)schedule auto-dismiss.
    ///
    /// Both timers for the id are cleared first, so nothing scheduled for a
    /// previous incarnation can fire.
    pub fn upsert(&mut self, entry: Entry, now_ms: u64) {
        let id = entry.id;
        let resurrected = self.timers.cancel_removal(id);
        self.timers.cancel_auto_dismiss(id);

        self.registry.upsert(entry);
        let version = self.publisher.publish(self.registry.entries()).version;

        let deadline = self
            .registry
            .get(id)
            .and_then(|entry| self.timers.schedule_auto_dismiss(entry, now_ms));
        debug!(id = %id, version, resurrected, auto_dismiss_at = ?deadline, "upserted");
    }

    /// Move an entry to Closing and schedule its removal.
    ///
    /// Unknown ids are a no-op. An entry that is already closing keeps its
    /// pending removal untouched.
    pub fn remove(&mut self, id: NotificationId, now_ms: u64) {
        match self.registry.mark_closing(id) {
            CloseTransition::Missing => {
                debug!(id = %id, "remove for unknown notification ignored");
            }
            CloseTransition::AlreadyClosing => {
                debug!(id = %id, "already closing");
            }
            CloseTransition::Closing => {
                self.timers.cancel_auto_dismiss(id);
                let version = self.publisher.publish(self.registry.entries()).version;
                let deadline = self.timers.schedule_removal(id, now_ms);
                debug!(id = %id, version, remove_at = deadline, "closing");
            }
        }
    }

    /// Delete the entry (if still present) and publish.
    pub fn finalize_removal(&mut self, id: NotificationId) {
        self.timers.cancel_auto_dismiss(id);
        self.timers.cancel_removal(id);
        let removed = self.registry.delete(id);
        let version = self.publisher.publish(self.registry.entries()).version;
        debug!(id = %id, removed, version, "removal finalized");
    }

    // ─── Presentation Requests ───────────────────────────────────

    /// Ask the source to dismiss a notification. Best effort.
    pub fn request_dismiss(&self, id: NotificationId) {
        if !self.registry.contains(id) {
            let err = NotifError::NotFound(id);
            debug!(error = %err, "dismiss request ignored");
            return;
        }
        self.call_dismiss(id);
    }

    /// Ask the source to invoke an action. Best effort.
    pub fn request_invoke(&self, id: NotificationId, action_id: &str) {
        if !self.registry.contains(id) {
            let err = NotifError::NotFound(id);
            debug!(error = %err, action_id, "invoke request ignored");
            return;
        }
        if let Err(err) = self.source.invoke(id, action_id) {
            warn!(id = %id, action_id, error = %err, "invoke failed");
        }
    }

    fn call_dismiss(&self, id: NotificationId) {
        if let Err(err) = self.source.dismiss(id) {
            warn!(id = %id, error = %err, "dismiss failed");
        }
    }

    // ─── Timers ──────────────────────────────────────────────────

    /// Earliest pending timer deadline on the caller's clock.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at `now_ms`. Returns how many fired.
    ///
    /// Auto-dismiss only asks the source to dismiss; the entry stays until the
    /// source answers with "resolved".
    pub fn fire_due(&mut self, now_ms: u64) -> usize {
        let expired = self.timers.take_expired(now_ms);
        for timer in &expired {
            match timer.kind {
                TimerKind::AutoDismiss => {
                    debug!(id = %timer.id, "auto-dismiss timer fired");
                    self.call_dismiss(timer.id);
                }
                TimerKind::Removal => self.finalize_removal(timer.id),
            }
        }
        expired.len()
    }

    pub fn is_timer_pending(&self, id: NotificationId, kind: TimerKind) -> bool {
        self.timers.is_pending(id, kind)
    }

    pub fn timer_deadline(&self, id: NotificationId, kind: TimerKind) -> Option<u64> {
        self.timers.deadline(id, kind)
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        self.publisher.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    pub fn entries(&self) -> &[Entry] {
        self.registry.entries()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
