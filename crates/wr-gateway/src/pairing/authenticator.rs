//! Pairing handshake driver
//!
//! One `PairingAuthenticator` runs per unauthenticated tenant, on its own
//! task. It consumes the connection's pairing events in order until a
//! terminal outcome:
//!
//! - `code`: render the code, notify `authenticating`, keep waiting
//! - `success`: mark the session authenticated, persist, notify `authenticated`
//! - `timeout`: disconnect, notify `timeout` (408), drop the watchdog
//! - anything else: log and keep waiting
//!
//! Cancellation comes from the session's watchdog token. Once it fires, the
//! task makes no further table mutations or notifications.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use wr_core::traits::{CodeRenderer, ConnectionHandle, NotificationSink, PairingEvents, StateStore};
use wr_core::{Notification, PairingEvent, Phone, SessionId};

use crate::registry::SessionTable;

/// Terminal state of a pairing task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The device accepted the pairing
    Authenticated,
    /// The handshake expired
    TimedOut,
    /// The watchdog fired (deactivation or shutdown)
    Cancelled,
    /// The event source ended without a terminal event
    SourceClosed,
}

/// Drives one tenant's pairing handshake
pub struct PairingAuthenticator {
    phone: Phone,
    session_id: SessionId,
    connection: Arc<dyn ConnectionHandle>,
    sessions: SessionTable,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn StateStore>,
    renderer: Arc<dyn CodeRenderer>,
    cancel: CancellationToken,
}

impl PairingAuthenticator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        phone: Phone,
        session_id: SessionId,
        connection: Arc<dyn ConnectionHandle>,
        sessions: SessionTable,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn StateStore>,
        renderer: Arc<dyn CodeRenderer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            phone,
            session_id,
            connection,
            sessions,
            sink,
            store,
            renderer,
            cancel,
        }
    }

    /// Consume `events` until the handshake reaches a terminal state
    pub async fn run(self, mut events: PairingEvents) -> PairingOutcome {
        tracing::debug!(phone = %self.phone, session = %self.session_id, "Pairing started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(phone = %self.phone, "Pairing cancelled");
                    return PairingOutcome::Cancelled;
                }
                next = events.next() => next,
            };

            let Some(event) = next else {
                tracing::warn!(phone = %self.phone, "Pairing event source closed without a result");
                self.release_watchdog().await;
                return PairingOutcome::SourceClosed;
            };

            tracing::debug!(phone = %self.phone, kind = event.kind(), "Pairing event received");

            if let Some(outcome) = self.handle_event(event).await {
                tracing::info!(phone = %self.phone, ?outcome, "Pairing finished");
                return outcome;
            }
        }
    }

    /// Apply one event. `None` means the handshake is still pending.
    async fn handle_event(&self, event: PairingEvent) -> Option<PairingOutcome> {
        match event {
            PairingEvent::Code(code) => {
                self.publish_code(code).await;
                None
            }
            PairingEvent::Success => Some(self.complete().await),
            PairingEvent::Timeout => Some(self.expire().await),
            PairingEvent::Other(name) => {
                tracing::info!(phone = %self.phone, "Unhandled pairing event: {}", name);
                None
            }
        }
    }

    async fn publish_code(&self, code: String) {
        let renderer = Arc::clone(&self.renderer);
        let phone = self.phone.clone();
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&phone, &code)).await;

        match rendered {
            Ok(Ok(path)) => {
                if self.cancel.is_cancelled() {
                    return;
                }
                self.sink.send(
                    &self.phone,
                    Notification::Authenticating {
                        qr_path: path.display().to_string(),
                    },
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(phone = %self.phone, "Failed to render pairing code: {}", e);
            }
            Err(e) => {
                tracing::warn!(phone = %self.phone, "Pairing code render task failed: {}", e);
            }
        }
    }

    async fn complete(&self) -> PairingOutcome {
        let committed = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&self.phone) {
                Some(session) if session.id == self.session_id && !self.cancel.is_cancelled() => {
                    session.authenticated = true;
                    session.watchdog = None;
                    true
                }
                _ => false,
            }
        };

        if !committed {
            tracing::debug!(phone = %self.phone, "Session no longer owned by this pairing, ignoring success");
            return PairingOutcome::Cancelled;
        }

        // The in-memory flag stays set even if this write fails
        if let Err(e) = self.store.write_authenticated(&self.phone, true).await {
            tracing::error!(phone = %self.phone, "Failed to persist authenticated flag: {}", e);
        }

        self.sink.send(&self.phone, Notification::Authenticated);
        PairingOutcome::Authenticated
    }

    async fn expire(&self) -> PairingOutcome {
        tracing::info!(phone = %self.phone, "Pairing timed out");
        self.connection.disconnect().await;
        self.sink.send(&self.phone, Notification::timeout());
        self.release_watchdog().await;
        PairingOutcome::TimedOut
    }

    /// Drop this task's watchdog from its session, if still registered
    async fn release_watchdog(&self) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&self.phone) {
            Some(session) if session.id == self.session_id => match session.watchdog.take() {
                Some(watchdog) => {
                    watchdog.cancel();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}
