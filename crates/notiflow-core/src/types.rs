use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Identity ─────────────────────────────────────────────────────

/// Source-assigned notification id. Always non-negative once validated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub u32);

impl NotificationId {
    /// Validate a raw (signed) id coming from the source.
    ///
    /// Negative or out-of-range values are rejected.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NotificationId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// ─── Actions ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

// ─── Expiry ───────────────────────────────────────────────────────

/// Expire timeout requested by the source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpireTimeout {
    /// Source gave no timeout (or a negative one); the engine default applies.
    #[default]
    SourceDefault,
    /// Explicit timeout in milliseconds. Zero means "already expired".
    After(u64),
}

impl ExpireTimeout {
    /// Map the source's signed timeout: negative means "use default".
    pub fn from_raw(raw: Option<i64>) -> Self {
        match raw.and_then(|ms| u64::try_from(ms).ok()) {
            Some(ms) => Self::After(ms),
            None => Self::SourceDefault,
        }
    }
}

// ─── Entry ────────────────────────────────────────────────────────

/// One live notification as held by the registry and published in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: NotificationId,
    pub summary: String,
    pub body: String,
    pub app_name: String,
    pub icon_name: String,
    /// Ordered as the source supplied them.
    pub actions: Vec<NotificationAction>,
    /// Ordering key for snapshots (most recent first).
    pub time: DateTime<Utc>,
    /// Exit phase: the presentation layer animates these out.
    pub closing: bool,
    /// Never auto-dismissed; needs explicit user dismissal.
    pub resident: bool,
    pub expire_timeout: ExpireTimeout,
}

impl Entry {
    /// Whether the entry waits for explicit user interaction instead of
    /// timing out on its own.
    pub fn requires_interaction(&self) -> bool {
        self.resident || !self.actions.is_empty()
    }
}

// ─── Source Record ────────────────────────────────────────────────

/// Raw record as the external notification source hands it over.
///
/// Every field is optional; [`crate::ingest::normalize`] is the only place
/// that interprets missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    pub id: Option<i64>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub app_name: Option<String>,
    pub app_icon: Option<String>,
    /// Flat alternating sequence: `[action_id, label, action_id, label, ..]`.
    pub actions: Option<Vec<String>>,
    pub resident: Option<bool>,
    /// Milliseconds; negative means "use default".
    pub expire_timeout: Option<i64>,
    /// Unix seconds.
    pub time: Option<i64>,
}

// ─── Error ────────────────────────────────────────────────────────

/// Errors that stay inside the engine. None of them reach the presentation
/// layer: callers log and drop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifError {
    #[error("notification {0} not found")]
    NotFound(NotificationId),
    #[error("malformed notification record: {0}")]
    MalformedRecord(String),
    #[error("external source call failed: {0}")]
    ExternalCallFailure(String),
}
