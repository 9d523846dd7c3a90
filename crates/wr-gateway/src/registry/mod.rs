//! Tenant session registry
//!
//! The `SessionRegistry` is the authoritative table of tenant sessions. It
//! activates tenants (connecting directly when a credential exists, or
//! launching a pairing task when not), deactivates them, and answers
//! activation/authentication queries.
//!
//! # Locking
//!
//! One exclusive lock guards the table. It is held only while an entry is
//! inserted, read or mutated, never across a network call, so a slow
//! connect or a pending handshake for one phone never stalls another.
//! Pairing tasks take the same lock for each of their own mutations.

mod session;

pub use session::{TenantSession, Watchdog};
pub(crate) use session::SessionTable;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use wr_core::error::{BridgeError, PersistenceError};
use wr_core::traits::{CodeRenderer, ConnectionHandle, Connector, NotificationSink, StateStore};
use wr_core::{Notification, Phone, SessionId, SessionView};

use crate::pairing::PairingAuthenticator;

/// How long `shutdown` waits for pairing tasks to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What an activation decided while holding the lock
struct ActivationPlan {
    id: SessionId,
    connection: Arc<dyn ConnectionHandle>,
    authenticated: bool,
    started_at: DateTime<Utc>,
    watchdog: Option<CancellationToken>,
    started: CancellationToken,
}

/// Authoritative table of tenant sessions
pub struct SessionRegistry {
    sessions: SessionTable,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn StateStore>,
    renderer: Arc<dyn CodeRenderer>,
    tasks: TaskTracker,
}

impl SessionRegistry {
    /// Create an empty registry wired to its collaborators
    pub fn new(
        connector: Arc<dyn Connector>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn StateStore>,
        renderer: Arc<dyn CodeRenderer>,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            connector,
            sink,
            store,
            renderer,
            tasks: TaskTracker::new(),
        }
    }

    /// Activate a tenant.
    ///
    /// Returns the existing session unchanged if it is live. Otherwise a new
    /// session is created: with a stored credential it connects and notifies
    /// `connected`; without one it starts pairing in the background and
    /// returns as soon as the handshake is initiated.
    ///
    /// A call that finds a session still connecting waits for that attempt
    /// to finish, then answers from its outcome (retrying if it failed).
    ///
    /// Connection and persistence failures abort the activation and leave no
    /// active session behind.
    pub async fn activate(&self, phone: &Phone) -> Result<SessionView, BridgeError> {
        let (plan, stale) = loop {
            let mut sessions = self.sessions.lock().await;
            if let Some(existing) = sessions.get(phone) {
                if existing.is_live() {
                    if !existing.is_starting() {
                        return Ok(existing.view());
                    }
                    let started = existing.started.clone();
                    drop(sessions);
                    tracing::debug!(phone = %phone, "Waiting for in-flight activation");
                    started.cancelled().await;
                    continue;
                }
            }

            let connection = self.connector.open(phone)?;
            let mut session = TenantSession::new(phone.clone(), connection);
            session.authenticated = session.connection.has_credential();
            session.active = true;

            let watchdog = if session.authenticated {
                None
            } else {
                let watchdog = Watchdog::new();
                let token = watchdog.token();
                session.watchdog = Some(watchdog);
                Some(token)
            };

            let plan = ActivationPlan {
                id: session.id,
                connection: Arc::clone(&session.connection),
                authenticated: session.authenticated,
                started_at: session.started_at,
                watchdog,
                started: session.started.clone(),
            };
            let stale = sessions.insert(phone.clone(), session);
            break (plan, stale);
        };
        // Released on every exit, including a dropped caller
        let _started = plan.started.clone().drop_guard();

        tracing::info!(
            phone = %phone,
            session = %plan.id,
            authenticated = plan.authenticated,
            "Activating tenant"
        );

        // A stale active entry still owns an open credential store
        if let Some(stale) = stale.filter(|s| s.active) {
            teardown(&stale.connection).await;
        }

        if let Err(e) = self.start(phone, &plan).await {
            tracing::warn!(phone = %phone, "Activation failed: {}", e);
            self.abort_activation(phone, plan.id).await;
            return Err(e);
        }

        let current = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(phone)
                .filter(|s| s.id == plan.id)
                .map(|s| s.view())
        };

        match current {
            Some(view) if view.active => Ok(view),
            other => {
                // Deactivated or forgotten while we were connecting
                tracing::debug!(phone = %phone, "Session torn down during activation");
                plan.connection.disconnect().await;
                Ok(other.unwrap_or(SessionView {
                    id: plan.id,
                    phone: phone.clone(),
                    active: false,
                    authenticated: plan.authenticated,
                    started_at: plan.started_at,
                }))
            }
        }
    }

    /// Network half of an activation, run outside the lock
    async fn start(&self, phone: &Phone, plan: &ActivationPlan) -> Result<(), BridgeError> {
        let Some(token) = plan.watchdog.clone() else {
            plan.connection.connect().await?;
            self.store.write_authenticated(phone, true).await?;
            self.sink.send(phone, Notification::Connected);
            return Ok(());
        };

        let events = plan.connection.pairing_events().await?;
        plan.connection.connect().await?;
        self.store.write_authenticated(phone, false).await?;

        let authenticator = PairingAuthenticator::new(
            phone.clone(),
            plan.id,
            Arc::clone(&plan.connection),
            Arc::clone(&self.sessions),
            Arc::clone(&self.sink),
            Arc::clone(&self.store),
            Arc::clone(&self.renderer),
            token,
        );
        self.tasks.spawn(authenticator.run(events));
        Ok(())
    }

    /// Remove a session whose activation failed
    async fn abort_activation(&self, phone: &Phone, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            if sessions.get(phone).is_some_and(|s| s.id == id) {
                sessions.remove(phone)
            } else {
                None
            }
        };

        if let Some(session) = removed {
            if let Some(watchdog) = session.watchdog {
                watchdog.cancel();
            }
            teardown(&session.connection).await;
        }
    }

    /// Deactivate a tenant.
    ///
    /// Returns `false` if the phone has no session. The entry stays in the
    /// table, inactive, until it is reactivated or forgotten.
    pub async fn deactivate(&self, phone: &Phone) -> bool {
        let connection = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(phone) else {
                return false;
            };
            if !session.active {
                return true;
            }
            session.active = false;
            if let Some(watchdog) = session.watchdog.take() {
                watchdog.cancel();
            }
            Arc::clone(&session.connection)
        };

        teardown(&connection).await;
        tracing::info!(phone = %phone, "Tenant deactivated");
        true
    }

    /// In-memory activation flag; `false` if the phone has no session
    pub async fn check_activation(&self, phone: &Phone) -> bool {
        self.sessions
            .lock()
            .await
            .get(phone)
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// Persisted authentication flag.
    ///
    /// Reads the state store, not the in-memory session, so it can lag a
    /// pairing that just completed if the store write failed.
    pub async fn check_authentication(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        self.store.read_authenticated(phone).await
    }

    /// Snapshot of one session
    pub async fn get(&self, phone: &Phone) -> Option<SessionView> {
        self.sessions.lock().await.get(phone).map(|s| s.view())
    }

    /// Whether a pairing task is registered for the phone
    pub async fn is_pairing(&self, phone: &Phone) -> bool {
        self.sessions
            .lock()
            .await
            .get(phone)
            .is_some_and(|s| s.is_pairing())
    }

    /// Snapshot of every known session, ordered by phone
    pub async fn list(&self) -> Vec<SessionView> {
        let mut views: Vec<SessionView> =
            self.sessions.lock().await.values().map(|s| s.view()).collect();
        views.sort_by(|a, b| a.phone.cmp(&b.phone));
        views
    }

    /// Deactivate a tenant and erase everything stored about it.
    ///
    /// Returns whether the phone was known to the table or the store.
    pub async fn forget(&self, phone: &Phone) -> Result<bool, BridgeError> {
        self.deactivate(phone).await;
        let in_table = self.sessions.lock().await.remove(phone).is_some();
        let in_store = self.store.remove(phone).await?;
        self.connector.forget(phone).await?;

        tracing::info!(phone = %phone, "Tenant forgotten");
        Ok(in_table || in_store)
    }

    /// Deactivate every session and wait briefly for pairing tasks to stop
    pub async fn shutdown(&self) {
        let phones: Vec<Phone> = self.sessions.lock().await.keys().cloned().collect();
        tracing::info!("Draining {} tenant sessions", phones.len());

        for phone in &phones {
            self.deactivate(phone).await;
        }

        self.tasks.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!("{} pairing tasks still running after shutdown", self.tasks.len());
        }
    }

    /// Number of known sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Disconnect and release a connection, logging release failures
async fn teardown(connection: &Arc<dyn ConnectionHandle>) {
    connection.disconnect().await;
    if let Err(e) = connection.release().await {
        tracing::warn!(phone = %connection.phone(), "Failed to release connection: {}", e);
    }
}
