//! IPC protocol between the CLI and the gateway
//!
//! JSON lines over TCP on localhost (127.0.0.1). Every request gets exactly
//! one response line; notification events for subscribed phones may be
//! interleaved between responses.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_IPC_PORT;
use crate::types::{Notification, SessionView};

/// Default IPC address
pub fn default_ipc_address() -> String {
    format!("127.0.0.1:{}", DEFAULT_IPC_PORT)
}

/// IPC request from client to gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Activate a tenant, starting pairing if needed
    Activate { phone: String },

    /// Deactivate a tenant
    Deactivate { phone: String },

    /// In-memory activation flag
    CheckActivation { phone: String },

    /// Persisted authentication flag
    CheckAuthentication { phone: String },

    /// List every known tenant session
    ListSessions,

    /// Deactivate a tenant and erase its stored state and credential
    Forget { phone: String },

    /// Receive notifications for a phone
    Subscribe { phone: String },

    /// Stop receiving notifications for a phone
    Unsubscribe { phone: String },

    /// Gateway status
    GetStatus,

    /// Ping (for keepalive)
    Ping,

    /// Shut the gateway down
    Shutdown,
}

/// IPC response from gateway to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Session view after activation
    Session(SessionView),

    /// Result of a deactivation
    Deactivated { existed: bool },

    /// Activation flag
    Activation { active: bool },

    /// Authentication flag
    Authentication { authenticated: bool },

    /// Session listing
    Sessions { sessions: Vec<SessionView> },

    /// Gateway status
    Status(GatewayStatus),

    /// Result of a forget request
    Forgotten { existed: bool },

    /// Generic success
    Ok,

    /// Error response
    Error { message: String },

    /// Pong response
    Pong,
}

/// IPC event pushed to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcEvent {
    /// Status update for a tenant
    Notification {
        phone: String,
        payload: Notification,
    },
}

/// Gateway status information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Known tenant sessions
    pub session_count: usize,
    /// Sessions currently active
    pub active_count: usize,
    /// Sessions currently authenticated (in memory)
    pub authenticated_count: usize,
    /// Gateway version
    pub version: String,
}

/// Any line the gateway may write
#[derive(Debug, Clone)]
pub enum IpcMessage {
    Response(IpcResponse),
    Event(IpcEvent),
}

impl IpcMessage {
    /// Parse one line from the gateway.
    ///
    /// Events and responses share the `type` tag namespace, so events are
    /// tried first.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<IpcEvent>(line) {
            Ok(event) => Ok(IpcMessage::Event(event)),
            Err(_) => serde_json::from_str::<IpcResponse>(line).map(IpcMessage::Response),
        }
    }
}
