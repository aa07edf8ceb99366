//! Stdio bridge: a JSON-lines stand-in for the external notification source.
//!
//! Input (stdin), one object per line:
//! `{"event":"notified","id":3,"record":{..}}`, `{"event":"resolved","id":3}`,
//! `{"event":"dismiss","id":3}`, `{"event":"invoke","id":3,"action":"open"}`.
//!
//! Output (stdout), one object per line: snapshots plus the dismiss/invoke
//! requests the engine sends back to the source.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notiflow_core::types::{NotifError, NotificationId, SourceRecord};
use notiflow_engine::publisher::Snapshot;
use notiflow_engine::source::NotificationSource;

use crate::driver::{Command, EngineHandle, RecordFeed};

// ─── Wire Lines ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundLine {
    Notified {
        id: i64,
        #[serde(default)]
        record: Option<SourceRecord>,
    },
    Resolved {
        id: i64,
    },
    Dismiss {
        id: NotificationId,
    },
    Invoke {
        id: NotificationId,
        action: String,
    },
}

impl From<InboundLine> for Command {
    fn from(line: InboundLine) -> Self {
        match line {
            InboundLine::Notified { id, record } => Command::Notified { id, record },
            InboundLine::Resolved { id } => Command::Resolved { id },
            InboundLine::Dismiss { id } => Command::Dismiss { id },
            InboundLine::Invoke { id, action } => Command::Invoke {
                id,
                action_id: action,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundLine {
    Snapshot(Snapshot),
    Dismiss { id: NotificationId },
    Invoke { id: NotificationId, action: String },
}

// ─── Source ──────────────────────────────────────────────────────

/// Source whose records arrive on stdin and whose requests leave on stdout.
#[derive(Debug)]
pub struct BridgeSource {
    records: HashMap<NotificationId, SourceRecord>,
    outbound: mpsc::UnboundedSender<OutboundLine>,
}

impl BridgeSource {
    pub fn new(outbound: mpsc::UnboundedSender<OutboundLine>) -> Self {
        Self {
            records: HashMap::new(),
            outbound,
        }
    }

    fn emit(&self, line: OutboundLine) -> Result<(), NotifError> {
        self.outbound
            .send(line)
            .map_err(|_| NotifError::ExternalCallFailure("bridge output closed".to_owned()))
    }
}

impl NotificationSource for BridgeSource {
    fn get_by_id(&self, id: NotificationId) -> Option<SourceRecord> {
        self.records.get(&id).cloned()
    }

    fn dismiss(&self, id: NotificationId) -> Result<(), NotifError> {
        self.emit(OutboundLine::Dismiss { id })
    }

    fn invoke(&self, id: NotificationId, action_id: &str) -> Result<(), NotifError> {
        self.emit(OutboundLine::Invoke {
            id,
            action: action_id.to_owned(),
        })
    }
}

impl RecordFeed for BridgeSource {
    fn feed(&mut self, id: NotificationId, record: SourceRecord) {
        self.records.insert(id, record);
    }

    fn forget(&mut self, id: NotificationId) {
        self.records.remove(&id);
    }
}

// ─── Tasks ───────────────────────────────────────────────────────

/// Read inbound lines and forward them to the driver.
///
/// Undecodable lines are logged and skipped. Returns on EOF, cancellation,
/// or when the driver is gone.
pub async fn read_commands<R>(
    reader: R,
    handle: EngineHandle,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("bridge: input closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundLine>(line) {
            Ok(inbound) => {
                if handle.send(inbound.into()).await.is_err() {
                    debug!("bridge: driver gone, stopping reader");
                    break;
                }
            }
            Err(err) => warn!(error = %err, "bridge: skipping undecodable line"),
        }
    }
    Ok(())
}

/// Forward every published snapshot to the output queue.
pub async fn forward_snapshots(
    mut snapshots: broadcast::Receiver<Snapshot>,
    outbound: mpsc::UnboundedSender<OutboundLine>,
) {
    loop {
        let snapshot = match snapshots.recv().await {
            Ok(s) => s,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "bridge: snapshot forwarder lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if outbound.send(OutboundLine::Snapshot(snapshot)).is_err() {
            break;
        }
    }
}

/// Write outbound lines as JSON until every sender is dropped.
pub async fn write_outbound<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<OutboundLine>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        writer.write_all(&buf).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use notiflow_core::types::{Entry, ExpireTimeout};

    #[test]
    fn parses_all_inbound_lines() {
        let notified: InboundLine = serde_json::from_str(
            r#"{"event":"notified","id":3,"record":{"summary":"hi","actions":["a","Open"]}}"#,
        )
        .expect("notified");
        match notified {
            InboundLine::Notified { id, record } => {
                assert_eq!(id, 3);
                let record = record.expect("record present");
                assert_eq!(record.summary.as_deref(), Some("hi"));
                assert_eq!(record.actions.map(|a| a.len()), Some(2));
            }
            other => panic!("unexpected line: {other:?}"),
        }

        let resolved: InboundLine =
            serde_json::from_str(r#"{"event":"resolved","id":-1}"#).expect("resolved");
        assert_eq!(resolved, InboundLine::Resolved { id: -1 });

        let dismiss: InboundLine =
            serde_json::from_str(r#"{"event":"dismiss","id":4}"#).expect("dismiss");
        assert_eq!(
            Command::from(dismiss),
            Command::Dismiss {
                id: NotificationId(4)
            }
        );

        let invoke: InboundLine =
            serde_json::from_str(r#"{"event":"invoke","id":4,"action":"open"}"#).expect("invoke");
        assert_eq!(
            Command::from(invoke),
            Command::Invoke {
                id: NotificationId(4),
                action_id: "open".to_owned()
            }
        );
    }

    #[test]
    fn notified_without_record_is_allowed() {
        let line: InboundLine =
            serde_json::from_str(r#"{"event":"notified","id":9}"#).expect("valid");
        assert_eq!(line, InboundLine::Notified { id: 9, record: None });
    }

    #[test]
    fn negative_dismiss_id_is_rejected() {
        assert!(serde_json::from_str::<InboundLine>(r#"{"event":"dismiss","id":-2}"#).is_err());
    }

    #[test]
    fn outbound_lines_are_tagged() {
        let entry = Entry {
            id: NotificationId(1),
            summary: "s".to_owned(),
            body: String::new(),
            app_name: String::new(),
            icon_name: "i".to_owned(),
            actions: Vec::new(),
            time: DateTime::<Utc>::from_timestamp(0, 0).expect("valid ts"),
            closing: true,
            resident: false,
            expire_timeout: ExpireTimeout::SourceDefault,
        };
        let snapshot = OutboundLine::Snapshot(Snapshot {
            version: 3,
            entries: Arc::from(vec![entry]),
        });
        let json = serde_json::to_value(&snapshot).expect("serializes");
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["version"], 3);
        assert_eq!(json["entries"][0]["closing"], true);

        let dismiss = serde_json::to_value(OutboundLine::Dismiss {
            id: NotificationId(2),
        })
        .expect("serializes");
        assert_eq!(dismiss, serde_json::json!({"type": "dismiss", "id": 2}));
    }

    #[test]
    fn bridge_source_emits_requests() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut source = BridgeSource::new(tx);
        source.feed(NotificationId(1), SourceRecord::default());
        assert!(source.get_by_id(NotificationId(1)).is_some());

        source.dismiss(NotificationId(1)).expect("dismiss");
        source.invoke(NotificationId(1), "open").expect("invoke");
        assert_eq!(
            rx.try_recv().expect("dismiss line"),
            OutboundLine::Dismiss {
                id: NotificationId(1)
            }
        );
        assert_eq!(
            rx.try_recv().expect("invoke line"),
            OutboundLine::Invoke {
                id: NotificationId(1),
                action: "open".to_owned()
            }
        );

        source.forget(NotificationId(1));
        assert!(source.get_by_id(NotificationId(1)).is_none());
    }

    #[test]
    fn bridge_source_reports_closed_output() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let source = BridgeSource::new(tx);
        let err = source.dismiss(NotificationId(1)).expect_err("closed");
        assert!(matches!(err, NotifError::ExternalCallFailure(_)));
    }

    #[tokio::test]
    async fn reader_forwards_and_skips_garbage() {
        let input: &[u8] = b"{\"event\":\"resolved\",\"id\":1}\n\nnot json\n{\"event\":\"dismiss\",\"id\":2}\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_commands(input, EngineHandle::new(tx), CancellationToken::new())
            .await
            .expect("reader");

        assert_eq!(rx.recv().await, Some(Command::Resolved { id: 1 }));
        assert_eq!(
            rx.recv().await,
            Some(Command::Dismiss {
                id: NotificationId(2)
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn writer_emits_json_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(OutboundLine::Dismiss {
            id: NotificationId(5),
        })
        .expect("send");
        tx.send(OutboundLine::Invoke {
            id: NotificationId(5),
            action: "a".to_owned(),
        })
        .expect("send");
        drop(tx);

        let mut out = Vec::new();
        write_outbound(&mut out, rx).await.expect("writer");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"type":"dismiss","id":5}"#,
                r#"{"type":"invoke","id":5,"action":"a"}"#
            ]
        );
    }

    #[tokio::test]
    async fn forwarder_stops_when_publisher_drops() {
        let (snap_tx, snap_rx) = broadcast::channel(4);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        snap_tx
            .send(Snapshot::empty())
            .expect("subscriber present");
        drop(snap_tx);

        forward_snapshots(snap_rx, out_tx).await;
        assert_eq!(
            out_rx.recv().await,
            Some(OutboundLine::Snapshot(Snapshot::empty()))
        );
        assert_eq!(out_rx.recv().await, None);
    }
}
