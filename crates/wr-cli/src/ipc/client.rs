//! IPC client for communicating with the gateway

use std::collections::VecDeque;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use wr_core::ipc::{default_ipc_address, GatewayStatus, IpcEvent, IpcMessage, IpcRequest, IpcResponse};
use wr_core::{Phone, SessionView};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Client for communicating with the gateway daemon
pub struct GatewayClient {
    address: String,
    connection: Option<Connection>,
    /// Events that arrived while waiting for a response
    pending_events: VecDeque<IpcEvent>,
}

impl GatewayClient {
    /// Create a new client with default address
    pub fn new() -> Self {
        Self::with_address(default_ipc_address())
    }

    /// Create a new client with custom address
    pub fn with_address(address: String) -> Self {
        Self {
            address,
            connection: None,
            pending_events: VecDeque::new(),
        }
    }

    /// Client for a gateway on a local port
    pub fn with_port(port: u16) -> Self {
        Self::with_address(format!("127.0.0.1:{}", port))
    }

    /// Connect to the gateway if not already connected
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        tracing::debug!("Connecting to gateway at {}", self.address);

        let stream = TcpStream::connect(&self.address).await.with_context(|| {
            format!(
                "Failed to connect to gateway at {}. Is the gateway running?",
                self.address
            )
        })?;

        let (reader, writer) = stream.into_split();
        self.connection = Some(Connection {
            reader: BufReader::new(reader),
            writer,
        });
        Ok(())
    }

    /// Check if the gateway is running
    pub async fn ping(&mut self) -> Result<bool> {
        self.connect().await?;

        match self.send_request(IpcRequest::Ping).await {
            Ok(IpcResponse::Pong) => Ok(true),
            _ => Ok(false),
        }
    }

    /// Activate a tenant
    pub async fn activate(&mut self, phone: &Phone) -> Result<SessionView> {
        let request = IpcRequest::Activate {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Session(view) => Ok(view),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Deactivate a tenant; `false` if the gateway had no session for it
    pub async fn deactivate(&mut self, phone: &Phone) -> Result<bool> {
        let request = IpcRequest::Deactivate {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Deactivated { existed } => Ok(existed),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    pub async fn check_activation(&mut self, phone: &Phone) -> Result<bool> {
        let request = IpcRequest::CheckActivation {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Activation { active } => Ok(active),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    pub async fn check_authentication(&mut self, phone: &Phone) -> Result<bool> {
        let request = IpcRequest::CheckAuthentication {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Authentication { authenticated } => Ok(authenticated),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// List every tenant session the gateway knows
    pub async fn list_sessions(&mut self) -> Result<Vec<SessionView>> {
        match self.send_request(IpcRequest::ListSessions).await? {
            IpcResponse::Sessions { sessions } => Ok(sessions),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Erase a tenant; `false` if nothing was known about it
    pub async fn forget(&mut self, phone: &Phone) -> Result<bool> {
        let request = IpcRequest::Forget {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Forgotten { existed } => Ok(existed),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Receive notifications for a phone on this connection
    pub async fn subscribe(&mut self, phone: &Phone) -> Result<()> {
        let request = IpcRequest::Subscribe {
            phone: phone.to_string(),
        };
        match self.send_request(request).await? {
            IpcResponse::Ok => Ok(()),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Get gateway status
    pub async fn status(&mut self) -> Result<GatewayStatus> {
        match self.send_request(IpcRequest::GetStatus).await? {
            IpcResponse::Status(status) => Ok(status),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Shutdown the gateway
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.send_request(IpcRequest::Shutdown).await? {
            IpcResponse::Ok => Ok(()),
            IpcResponse::Error { message } => anyhow::bail!("{}", message),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Next pushed event, or `None` once the gateway closes the connection
    pub async fn next_event(&mut self) -> Result<Option<IpcEvent>> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }

        loop {
            match self.read_message().await? {
                None => return Ok(None),
                Some(IpcMessage::Event(event)) => return Ok(Some(event)),
                Some(IpcMessage::Response(response)) => {
                    tracing::debug!("Ignoring unsolicited response: {:?}", response);
                }
            }
        }
    }

    /// Send a request and wait for its response, buffering any events
    async fn send_request(&mut self, request: IpcRequest) -> Result<IpcResponse> {
        self.connect().await?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Not connected"))?;

        let mut request_json = serde_json::to_string(&request)?;
        request_json.push('\n');
        connection.writer.write_all(request_json.as_bytes()).await?;

        loop {
            match self.read_message().await? {
                None => anyhow::bail!("Gateway closed the connection"),
                Some(IpcMessage::Response(response)) => return Ok(response),
                Some(IpcMessage::Event(event)) => self.pending_events.push_back(event),
            }
        }
    }

    async fn read_message(&mut self) -> Result<Option<IpcMessage>> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Not connected"))?;

        let mut line = String::new();
        loop {
            line.clear();
            if connection.reader.read_line(&mut line).await? == 0 {
                self.connection = None;
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let message = IpcMessage::parse(trimmed)
                    .with_context(|| format!("Malformed gateway message: {}", trimmed))?;
                return Ok(Some(message));
            }
        }
    }
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new()
    }
}
