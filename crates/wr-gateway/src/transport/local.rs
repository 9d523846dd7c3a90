//! Local linked-device transport
//!
//! Each tenant's device credential is a file, `device-<phone>.json`, in the
//! session directory. A tenant with that file is paired. While pairing, the
//! connection hands out rotating random codes and reports success as soon
//! as the credential file appears (written by whatever completes the link),
//! or a timeout once every code has expired.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wr_core::config::PairingConfig;
use wr_core::error::ConnectionError;
use wr_core::traits::{ConnectionHandle, Connector, PairingEvents};
use wr_core::{PairingEvent, Phone};

/// How often a pending handshake checks for the credential file
const CREDENTIAL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Length of the random part of a pairing code
const CODE_REF_LEN: usize = 32;

/// Opens `LocalConnection`s rooted in a session directory
pub struct LocalConnector {
    session_dir: PathBuf,
    pairing: PairingConfig,
}

impl LocalConnector {
    pub fn new(session_dir: impl Into<PathBuf>, pairing: PairingConfig) -> Self {
        Self {
            session_dir: session_dir.into(),
            pairing,
        }
    }

    /// Create the session directory. Call once before the first `open`.
    pub async fn prepare(&self) -> Result<(), ConnectionError> {
        tokio::fs::create_dir_all(&self.session_dir).await?;
        Ok(())
    }

    /// Where the tenant's device credential lives
    pub fn credential_path(&self, phone: &Phone) -> PathBuf {
        credential_path(&self.session_dir, phone)
    }
}

fn credential_path(session_dir: &Path, phone: &Phone) -> PathBuf {
    session_dir.join(format!("device-{}.json", phone))
}

#[async_trait]
impl Connector for LocalConnector {
    fn open(&self, phone: &Phone) -> Result<Arc<dyn ConnectionHandle>, ConnectionError> {
        Ok(Arc::new(LocalConnection::new(
            phone.clone(),
            self.credential_path(phone),
            self.pairing.clone(),
        )))
    }

    async fn forget(&self, phone: &Phone) -> Result<(), ConnectionError> {
        let path = self.credential_path(phone);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(phone = %phone, "Removed device credential {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One tenant's local device link
pub struct LocalConnection {
    phone: Phone,
    credential_path: PathBuf,
    pairing: PairingConfig,
    connected: AtomicBool,
    released: AtomicBool,
    /// Fired on disconnect; ends any pairing stream
    closed: CancellationToken,
}

impl LocalConnection {
    pub fn new(phone: Phone, credential_path: PathBuf, pairing: PairingConfig) -> Self {
        Self {
            phone,
            credential_path,
            pairing,
            connected: AtomicBool::new(false),
            released: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ConnectionError::Released(self.phone.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionHandle for LocalConnection {
    fn phone(&self) -> &Phone {
        &self.phone
    }

    fn has_credential(&self) -> bool {
        self.credential_path.exists()
    }

    async fn pairing_events(&self) -> Result<PairingEvents, ConnectionError> {
        self.ensure_open()?;
        if self.has_credential() {
            return Err(ConnectionError::PairingUnavailable(format!(
                "{} is already paired",
                self.phone
            )));
        }

        let link = PendingLink {
            phone: self.phone.clone(),
            credential_path: self.credential_path.clone(),
            pairing: self.pairing.clone(),
            closed: self.closed.clone(),
            issued: 0,
        };
        Ok(futures::stream::unfold(Some(link), |state| async move {
            let mut link = match state {
                Some(link) => link,
                None => return None,
            };
            let event = match link.next_event().await {
                Some(event) => event,
                None => return None,
            };
            let more = !event.is_terminal();
            Some((event, more.then_some(link)))
        })
        .boxed())
    }

    async fn connect(&self) -> Result<(), ConnectionError> {
        self.ensure_open()?;
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Lost(format!(
                "{} was disconnected",
                self.phone
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(phone = %self.phone, "Local device link connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.closed.cancel();
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::debug!(phone = %self.phone, "Local device link disconnected");
        }
    }

    async fn release(&self) -> Result<(), ConnectionError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// State of an unfinished handshake
struct PendingLink {
    phone: Phone,
    credential_path: PathBuf,
    pairing: PairingConfig,
    closed: CancellationToken,
    issued: u32,
}

impl PendingLink {
    /// Next event, or `None` once the link is disconnected
    async fn next_event(&mut self) -> Option<PairingEvent> {
        if self.issued == 0 {
            self.issued = 1;
            return Some(PairingEvent::Code(new_code(&self.phone)));
        }

        let lifetime = if self.issued == 1 {
            self.pairing.first_code_timeout
        } else {
            self.pairing.code_rotation
        };
        let deadline = Instant::now() + lifetime;

        loop {
            if tokio::fs::metadata(&self.credential_path).await.is_ok() {
                return Some(PairingEvent::Success);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = CREDENTIAL_POLL_INTERVAL.min(deadline - now);
            tokio::select! {
                _ = self.closed.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        if self.issued >= self.pairing.max_codes {
            return Some(PairingEvent::Timeout);
        }
        self.issued += 1;
        Some(PairingEvent::Code(new_code(&self.phone)))
    }
}

fn new_code(phone: &Phone) -> String {
    let reference: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_REF_LEN)
        .map(char::from)
        .collect();
    format!("{}@{}", reference, phone)
}
