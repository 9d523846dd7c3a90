//! Observer-facing collaborators

use std::path::PathBuf;

use crate::error::RenderError;
use crate::types::{Notification, Phone};

/// Delivers status messages to whatever observes a tenant.
///
/// `send` is best-effort and must never block: with no observer the
/// message is dropped.
pub trait NotificationSink: Send + Sync {
    fn send(&self, phone: &Phone, notification: Notification);
}

/// Turns a raw pairing code into a scannable artifact on disk
pub trait CodeRenderer: Send + Sync {
    /// Render `code` and return the path of the written artifact
    fn render(&self, phone: &Phone, code: &str) -> Result<PathBuf, RenderError>;
}
