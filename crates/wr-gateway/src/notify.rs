//! Broadcast notification hub
//!
//! The gateway's `NotificationSink`. Every notification is published on a
//! single broadcast channel tagged with its phone; IPC clients subscribe and
//! keep only the phones they asked for.

use tokio::sync::broadcast;

use wr_core::traits::NotificationSink;
use wr_core::{Notification, Phone};

/// Capacity of the broadcast channel; slow receivers lose older messages.
const HUB_CAPACITY: usize = 256;

/// Fan-out of tenant notifications to any number of observers
pub struct NotificationHub {
    tx: broadcast::Sender<(Phone, Notification)>,
}

impl NotificationHub {
    /// Create a hub with no subscribers
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Subscribe to every notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<(Phone, Notification)> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for NotificationHub {
    fn send(&self, phone: &Phone, notification: Notification) {
        tracing::debug!(phone = %phone, kind = notification.kind(), "Publishing notification");
        // No subscribers is not an error: the message is simply dropped
        if self.tx.send((phone.clone(), notification)).is_err() {
            tracing::trace!(phone = %phone, "No observers, notification dropped");
        }
    }
}
