//! Single-writer driver: serializes source events, presentation requests,
//! and timer expiries into one [`Engine`].
//!
//! The engine lives inside one tokio task. Everything that mutates it arrives
//! over an mpsc channel or from the task's own timer sleep, so no two
//! mutations ever run concurrently and no locks guard engine state.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use notiflow_core::types::{NotificationId, SourceRecord};
use notiflow_engine::engine::Engine;
use notiflow_engine::publisher::Snapshot;
use notiflow_engine::source::NotificationSource;

/// Sources that receive their records through the driver's command stream
/// rather than fetching them on demand.
pub trait RecordFeed {
    fn feed(&mut self, id: NotificationId, record: SourceRecord);

    /// Drop a record once the source has resolved it.
    fn forget(&mut self, id: NotificationId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Source announced (or updated) a notification.
    Notified {
        id: i64,
        record: Option<SourceRecord>,
    },
    /// Source resolved a notification.
    Resolved { id: i64 },
    /// Presentation layer asks to dismiss.
    Dismiss { id: NotificationId },
    /// Presentation layer asks to invoke an action.
    Invoke {
        id: NotificationId,
        action_id: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("engine driver has shut down")]
    Closed,
}

// ─── Handle ──────────────────────────────────────────────────────

/// Cloneable sender side of the driver.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, command: Command) -> Result<(), DriverError> {
        self.tx.send(command).await.map_err(|_| DriverError::Closed)
    }

    pub async fn notified(&self, id: i64, record: Option<SourceRecord>) -> Result<(), DriverError> {
        self.send(Command::Notified { id, record }).await
    }

    pub async fn resolved(&self, id: i64) -> Result<(), DriverError> {
        self.send(Command::Resolved { id }).await
    }

    pub async fn dismiss(&self, id: NotificationId) -> Result<(), DriverError> {
        self.send(Command::Dismiss { id }).await
    }

    pub async fn invoke(&self, id: NotificationId, action_id: &str) -> Result<(), DriverError> {
        self.send(Command::Invoke {
            id,
            action_id: action_id.to_owned(),
        })
        .await
    }
}

// ─── Driver ──────────────────────────────────────────────────────

pub struct Driver<S> {
    engine: Engine<S>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    /// Zero point of the engine's millisecond clock.
    origin: Instant,
}

impl<S> Driver<S>
where
    S: NotificationSource + RecordFeed,
{
    pub fn new(
        engine: Engine<S>,
        queue_capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, EngineHandle) {
        let (tx, commands) = mpsc::channel(queue_capacity.max(1));
        let driver = Self {
            engine,
            commands,
            cancel,
            origin: Instant::now(),
        };
        (driver, EngineHandle::new(tx))
    }

    /// Subscribe to snapshots. Call before [`Driver::run`] to see the
    /// bootstrap snapshot too.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.engine.subscribe()
    }

    /// Main loop. Runs until every handle is dropped or the token is
    /// cancelled, then hands the engine back.
    pub async fn run(mut self) -> Engine<S> {
        let accepted = self.engine.bootstrap(self.now_ms());
        info!(accepted, "driver: event loop started");

        loop {
            let deadline_ms = self.engine.next_deadline();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("driver: cancellation requested, shutting down");
                    break;
                }
                due_ms = sleep_until_deadline(self.origin, deadline_ms) => {
                    // The sleep may wake a hair early on a real clock.
                    let now = self.now_ms().max(due_ms);
                    let fired = self.engine.fire_due(now);
                    debug!(now_ms = now, fired, "timers fired");
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        info!("driver: command channel closed, shutting down");
                        break;
                    }
                }
            }
        }

        self.engine
    }

    fn apply(&mut self, command: Command) {
        let now = self.now_ms();
        match command {
            Command::Notified { id, record } => {
                if let (Some(record), Some(nid)) = (record, NotificationId::from_raw(id)) {
                    self.engine.source_mut().feed(nid, record);
                }
                self.engine.on_notified(id, now);
            }
            Command::Resolved { id } => {
                self.engine.on_resolved(id, now);
                if let Some(nid) = NotificationId::from_raw(id) {
                    self.engine.source_mut().forget(nid);
                }
            }
            Command::Dismiss { id } => self.engine.request_dismiss(id),
            Command::Invoke { id, action_id } => self.engine.request_invoke(id, &action_id),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Sleep until `origin + deadline_ms`, or forever when nothing is pending.
async fn sleep_until_deadline(origin: Instant, deadline_ms: Option<u64>) -> u64 {
    match deadline_ms {
        Some(ms) => {
            tokio::time::sleep_until(origin + Duration::from_millis(ms)).await;
            ms
        }
        None => std::future::pending().await,
    }
}
