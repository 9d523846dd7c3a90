//! Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// HTTP-style status code carried by timeout notifications
pub const PAIRING_TIMEOUT_CODE: u16 = 408;

/// Tenant identifier: the phone number of the chat account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Create a phone, trimming whitespace and a leading `+`
    pub fn new(phone: impl Into<String>) -> Self {
        let raw = phone.into();
        let trimmed = raw.trim();
        Self(trimmed.strip_prefix('+').unwrap_or(trimmed).to_string())
    }

    /// Get the raw phone string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a plausible phone number (digits only).
    ///
    /// Phones end up in file names, so anything else is rejected at the
    /// IPC boundary.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= 20 && self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Phone {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Phone {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of one tenant session incarnation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate a fresh random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event produced by a connection while a pairing handshake is in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A (possibly rotated) pairing code to show to the user
    Code(String),
    /// The device accepted the pairing
    Success,
    /// The handshake expired without being accepted
    Timeout,
    /// Any other protocol event, identified by name
    Other(String),
}

impl PairingEvent {
    /// Protocol name of the event
    pub fn kind(&self) -> &str {
        match self {
            PairingEvent::Code(_) => "code",
            PairingEvent::Success => "success",
            PairingEvent::Timeout => "timeout",
            PairingEvent::Other(name) => name,
        }
    }

    /// Whether this event ends the handshake
    pub fn is_terminal(&self) -> bool {
        matches!(self, PairingEvent::Success | PairingEvent::Timeout)
    }
}

/// Status message delivered to whoever observes a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A pairing code image is ready to be scanned
    Authenticating {
        #[serde(rename = "qrPath")]
        qr_path: String,
    },
    /// Pairing completed
    Authenticated,
    /// Pairing expired
    Timeout { code: u16 },
    /// An already-paired tenant connected
    Connected,
}

impl Notification {
    /// Timeout notification with the standard 408 code
    pub fn timeout() -> Self {
        Notification::Timeout {
            code: PAIRING_TIMEOUT_CODE,
        }
    }

    /// The `type` tag of this notification
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Authenticating { .. } => "authenticating",
            Notification::Authenticated => "authenticated",
            Notification::Timeout { .. } => "timeout",
            Notification::Connected => "connected",
        }
    }
}

/// Caller-facing snapshot of a tenant session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session incarnation
    pub id: SessionId,
    /// Tenant phone
    pub phone: Phone,
    /// Activation attempted and not yet deactivated
    pub active: bool,
    /// Pairing completed (in-memory view)
    pub authenticated: bool,
    /// When the session was activated
    pub started_at: DateTime<Utc>,
}
