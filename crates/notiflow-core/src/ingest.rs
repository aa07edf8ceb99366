//! Ingest boundary: raw [`SourceRecord`] → validated [`Entry`].
//!
//! This is the only place that probes optional source fields. Everything
//! downstream works with the typed entry.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::types::{
    Entry, ExpireTimeout, NotifError, NotificationAction, NotificationId, SourceRecord,
};

/// Summary shown when the source sends none.
pub const DEFAULT_SUMMARY: &str = "Notification";

/// Normalize a source record delivered for `event_id`.
///
/// `now` is used as the ordering time when the record carries no usable
/// timestamp. New entries always start Active (`closing = false`).
pub fn normalize(
    event_id: NotificationId,
    record: &SourceRecord,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Entry, NotifError> {
    let id = match record.id {
        None => event_id,
        Some(raw) => {
            let id = NotificationId::from_raw(raw).ok_or_else(|| {
                NotifError::MalformedRecord(format!("invalid record id {raw}"))
            })?;
            if id != event_id {
                return Err(NotifError::MalformedRecord(format!(
                    "record id {id} does not match event id {event_id}"
                )));
            }
            id
        }
    };

    let summary = match record.summary.as_deref() {
        Some(s) if !s.is_empty() => s.to_owned(),
        _ => DEFAULT_SUMMARY.to_owned(),
    };
    let app_name = record.app_name.clone().unwrap_or_default();
    let icon_name = resolve_icon(&app_name, record.app_icon.as_deref(), config);
    let actions = record
        .actions
        .as_deref()
        .map(pair_actions)
        .unwrap_or_default();
    let time = record
        .time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(now);

    Ok(Entry {
        id,
        summary,
        body: record.body.clone().unwrap_or_default(),
        app_name,
        icon_name,
        actions,
        time,
        closing: false,
        resident: record.resident.unwrap_or(false),
        expire_timeout: ExpireTimeout::from_raw(record.expire_timeout),
    })
}

/// Pick the icon: source icon, then the app-name map, then the fallback.
pub fn resolve_icon(app_name: &str, app_icon: Option<&str>, config: &EngineConfig) -> String {
    if let Some(icon) = app_icon.filter(|icon| !icon.is_empty()) {
        return icon.to_owned();
    }
    config
        .app_icons
        .get(app_name)
        .cloned()
        .unwrap_or_else(|| config.fallback_icon.clone())
}

/// Pair a flat `[id, label, id, label, ..]` list into actions.
///
/// An empty or odd-length list yields no actions.
pub fn pair_actions(flat: &[String]) -> Vec<NotificationAction> {
    if flat.len() % 2 != 0 {
        return Vec::new();
    }
    flat.chunks_exact(2)
        .map(|pair| NotificationAction {
            id: pair[0].clone(),
            label: pair[1].clone(),
        })
        .collect()
}
