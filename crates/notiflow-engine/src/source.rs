//! Seam to the external notification source.

use notiflow_core::types::{NotifError, NotificationId, SourceRecord};

/// The external notification source the engine reads from and sends
/// requests to.
///
/// Implementations must not block: `dismiss` and `invoke` are fire-and-forget
/// and any completion comes back as a later `resolved` event.
pub trait NotificationSource {
    /// Full record for `id`, or `None` if the source no longer has it.
    fn get_by_id(&self, id: NotificationId) -> Option<SourceRecord>;

    /// Records that were already live when the engine started.
    fn list_unresolved(&self) -> Vec<SourceRecord> {
        Vec::new()
    }

    fn dismiss(&self, id: NotificationId) -> Result<(), NotifError>;

    fn invoke(&self, id: NotificationId, action_id: &str) -> Result<(), NotifError>;
}
