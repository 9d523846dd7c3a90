//! Tenant session entries

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use wr_core::traits::ConnectionHandle;
use wr_core::{Phone, SessionId, SessionView};

/// The registry table. Every mutation of an entry, including those made by
/// pairing tasks, happens under this one lock.
pub(crate) type SessionTable = Arc<Mutex<HashMap<Phone, TenantSession>>>;

/// Cancellation handle for a tenant's in-flight pairing task
#[derive(Debug)]
pub struct Watchdog {
    token: CancellationToken,
}

impl Watchdog {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token the pairing task listens on
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop the pairing task
    pub(crate) fn cancel(self) {
        self.token.cancel();
    }
}

/// One entry per tenant phone
pub struct TenantSession {
    pub(crate) id: SessionId,
    pub(crate) phone: Phone,
    pub(crate) connection: Arc<dyn ConnectionHandle>,
    pub(crate) active: bool,
    pub(crate) authenticated: bool,
    pub(crate) started_at: DateTime<Utc>,
    /// Present exactly while a pairing task owns this session
    pub(crate) watchdog: Option<Watchdog>,
    /// Cancelled once the activation that created this entry has finished
    /// connecting, whether it succeeded or not
    pub(crate) started: CancellationToken,
}

impl TenantSession {
    /// New, not yet active session owning `connection`
    pub(crate) fn new(phone: Phone, connection: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            id: SessionId::new(),
            phone,
            connection,
            active: false,
            authenticated: false,
            started_at: Utc::now(),
            watchdog: None,
            started: CancellationToken::new(),
        }
    }

    /// Whether a pairing task is in flight
    pub fn is_pairing(&self) -> bool {
        self.watchdog.is_some()
    }

    /// Whether the creating activation is still connecting
    pub fn is_starting(&self) -> bool {
        !self.started.is_cancelled()
    }

    /// Active and either paired or still pairing.
    ///
    /// An active session whose pairing timed out or whose event source
    /// closed is not live: its connection is gone and a new activation
    /// replaces it.
    pub fn is_live(&self) -> bool {
        self.active && (self.authenticated || self.is_pairing())
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            phone: self.phone.clone(),
            active: self.active,
            authenticated: self.authenticated,
            started_at: self.started_at,
        }
    }
}

impl std::fmt::Debug for TenantSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantSession")
            .field("id", &self.id)
            .field("phone", &self.phone)
            .field("active", &self.active)
            .field("authenticated", &self.authenticated)
            .field("pairing", &self.is_pairing())
            .field("starting", &self.is_starting())
            .finish()
    }
}
